//! eve-plugin-backend - the API plugin authors write against.
//!
//! This crate provides:
//! - Handler traits ([`CallResourceHandler`], [`CheckHealthHandler`], ...)
//! - The streaming [`ResponseWriter`] used by resource handlers
//! - Adapters from handlers to transport capabilities ([`build_capabilities`])
//! - An HTTP bridge for `tower`/`axum` services ([`HttpAdapter`], `http` feature)
//!
//! # Example
//!
//! ```rust,ignore
//! use eve_plugin_backend::{Handlers, StaticHealth, build_capabilities};
//!
//! let handlers = Handlers::new().with_check_health(StaticHealth::new("pong"));
//! let capabilities = build_capabilities(handlers, "my-plugin", "1.0.0");
//! ```

pub mod handler;
#[cfg(feature = "http")]
pub mod http;
pub mod registry;
pub mod resource;
pub mod runner;
pub mod service;
pub mod sniff;
pub mod writer;

pub use handler::{
    CallResourceHandler, CheckHealthHandler, PluginInfoHandler, Pub2ChannelHandler,
    StaticHealth, StaticPluginInfo, TaskHandler,
};
#[cfg(feature = "http")]
pub use http::HttpAdapter;
pub use registry::{Handlers, build_capabilities};
pub use resource::{ResourceAdapter, send_json, send_plain_text};
pub use runner::{ChannelPublisher, Publisher, TaskExecutor, TaskRunner};
pub use service::{InfoAdapter, RealtimeAdapter, TaskAdapter};
pub use sniff::detect_content_type;
pub use writer::{
    DEFAULT_STATUS, DeliveryObserver, LogDeliveryFailures, ResponseSender, ResponseWriter,
    WriterPhase,
};
