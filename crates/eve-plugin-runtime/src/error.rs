//! Runtime error types.
//!
//! Failures that must stop the plugin process are wrapped in
//! [`RuntimeError::Fatal`]. Library code never exits; [`crate::serve`] turns
//! any error into exit status 1.

use thiserror::Error;

use eve_plugin_core::{HandshakeError, TransportError};

use crate::config::ConfigError;
use crate::host::HostError;

/// Failures after which the plugin cannot continue.
#[derive(Error, Debug)]
pub enum FatalError {
    /// The process was not launched by a compatible host.
    #[error(
        "This binary is an eve plugin and is meant to be launched by the host. \
         Run it with `--debug` to attach to a running host instead ({0})"
    )]
    Handshake(#[source] HandshakeError),

    /// The RPC listener could not be bound.
    #[error("Failed to bind plugin server: {0}")]
    Bind(#[source] TransportError),

    /// The host refused or never answered the debug registration.
    #[error("Failed to register debug plugin with host: {0}")]
    DebugRegistration(#[source] HostError),

    /// The server stopped before publishing its address.
    #[error("Plugin server exited before it was ready")]
    NotReady,
}

/// Errors that can occur while running a plugin.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Fatal: {0}")]
    Fatal(#[from] FatalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Host API error: {0}")]
    Host(#[from] HostError),
}

impl RuntimeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
