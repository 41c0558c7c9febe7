//! eve-plugin-runtime - process orchestration for eve plugins.
//!
//! This crate provides:
//! - The plugin [`Lifecycle`] (production and debug/attach modes)
//! - The host API client used for debug registration ([`HttpHostApi`])
//! - Layered configuration ([`ConfigLoader`]) and the plugin manifest
//! - Logging setup ([`LoggingBuilder`])
//! - The [`serve`] entry point
//!
//! ```ignore
//! use eve_plugin_runtime::{PluginRuntime, serve};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = PluginRuntime::builder()
//!         .manifest_json(include_bytes!("../plugin.json"))?
//!         .build()?
//!         .handlers(handlers);
//!
//!     // Exits with status 1 on failure.
//!     serve(runtime).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod runtime;
pub mod signal;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, PluginConfig, PluginManifest, PluginSection,
};
pub use error::{FatalError, RuntimeError, RuntimeResult};
pub use host::{HostApi, HostError, HttpHostApi, LoadDebugPlugin, StopDebugPlugin};
pub use lifecycle::{Lifecycle, LifecycleState, Signal};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};
pub use runtime::{PluginRuntime, RuntimeBuilder, serve};
pub use signal::wait_for_shutdown;

// Re-export tracing for convenience
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
