//! Configuration for plugin processes.
//!
//! Settings are layered with figment (defaults, manifest, files, `EVE_*`
//! environment, overrides) into a [`PluginConfig`].

pub mod error;
pub mod loader;
pub mod manifest;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile};
pub use manifest::{BackendRoute, PluginManifest};
pub use schema::{
    HostConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PluginConfig,
    PluginSection, SpanEventConfig, TransportConfig,
};
pub use validation::validate_config;
