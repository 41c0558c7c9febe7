//! # eve-plugin
//!
//! SDK for writing backend plugins that an eve host spawns (or attaches to)
//! and calls over a local RPC channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────┐  handshake  ┌───────────┐     ┌────────────┐     ┌──────────────┐
//! │ Host │────────────▶│ RpcServer │────▶│ Capability │────▶│ Your handler │
//! │      │◀────────────│           │◀────│  adapter   │◀────│              │
//! └──────┘   frames    └───────────┘     └────────────┘     └──────────────┘
//! ```
//!
//! - **Core**: wire messages, domain model, conversions, the handshake contract
//! - **Transport**: framing, negotiation, per-call dispatch
//! - **Backend**: handler traits, the streaming response writer, adapters
//! - **Runtime**: lifecycle, configuration, logging, debug registration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eve_plugin::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = axum::Router::new().route("/api/ping", get(|| async { "pong" }));
//!
//!     let runtime = PluginRuntime::builder()
//!         .manifest_json(include_bytes!("../plugin.json"))?
//!         .build()?
//!         .handlers(Handlers::new().with_call_resource(HttpAdapter::new(router)));
//!
//!     serve(runtime).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `http`: tower/axum resource bridge (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use eve_plugin_backend as backend;
pub use eve_plugin_core as core;
pub use eve_plugin_runtime as runtime;
pub use eve_plugin_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use eve_plugin::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use eve_plugin_runtime::{PluginManifest, PluginRuntime, RuntimeBuilder, serve};

    // Handlers
    pub use eve_plugin_backend::{
        CallResourceHandler, ChannelPublisher, CheckHealthHandler, Handlers, PluginInfoHandler,
        Pub2ChannelHandler, Publisher, ResponseWriter, StaticHealth, TaskExecutor, TaskHandler,
        TaskRunner, send_json, send_plain_text,
    };
    #[cfg(feature = "http")]
    pub use eve_plugin_backend::HttpAdapter;
    #[cfg(feature = "http")]
    pub use eve_plugin_backend::http::plugin_context;

    // Domain model
    pub use eve_plugin_core::Headers;
    pub use eve_plugin_core::model::{
        CallResourceRequest, CheckHealthRequest, CheckHealthResult, HealthStatus, PluginContext,
        PluginInfo, PluginInfoRequest, PubStatus, Pub2ChannelRequest, Pub2ChannelResponse,
        TaskRequest, TaskResponse, TaskStatus, User,
    };

    pub use eve_plugin_runtime::prelude::*;
}
