//! Unified error types for the plugin SDK core.
//!
//! Transport-level failures, handshake mismatches and the RPC [`Status`]
//! returned to the host all live here so that every crate in the workspace
//! agrees on one taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while moving messages between host and plugin.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection closed by the peer.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// A message could not be handed to the outbound channel.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Encoding or decoding a message failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The encoded message exceeds the configured limit.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The peer sent a message that is not valid at this point.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Protocol negotiation failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The remote side answered the call with an error status.
    #[error("remote error: {0}")]
    Remote(Status),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Handshake Errors
// =============================================================================

/// Reasons a connecting peer is refused before any capability is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The magic cookie environment variable is absent.
    #[error(
        "this binary is a plugin and is not meant to be executed directly; \
         launch it from the host application (missing {key})"
    )]
    CookieMissing {
        /// Cookie key that was looked up.
        key: String,
    },

    /// The cookie key or value does not match.
    #[error("magic cookie mismatch for key '{key}'")]
    CookieMismatch {
        /// Cookie key presented by the peer.
        key: String,
    },

    /// The peer speaks a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this side speaks.
        expected: u32,
        /// Version the peer announced.
        actual: u32,
    },

    /// The peer refused the negotiation.
    #[error("handshake rejected: {reason}")]
    Rejected {
        /// Reason given by the peer.
        reason: String,
    },

    /// The announce line printed by the plugin could not be parsed.
    #[error("malformed announce line: {0}")]
    MalformedAnnounce(String),
}

// =============================================================================
// RPC Status
// =============================================================================

/// Coarse classification of a failed call, mirrored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// Unclassified failure.
    Unknown,
    /// The request could not be decoded or was malformed.
    InvalidArgument,
    /// The called capability is not registered.
    Unimplemented,
    /// A handler returned an error.
    Internal,
    /// The plugin is shutting down or otherwise unable to serve.
    Unavailable,
}

impl Code {
    /// Returns the code as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error status carried back to the caller of an RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct Status {
    /// Failure class.
    pub code: Code,
    /// Human readable detail.
    pub message: String,
}

impl Status {
    /// Creates a status with the given code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The called method is not implemented by this plugin.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// A handler failed.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// The request was malformed.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// The plugin cannot serve right now.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

impl From<TransportError> for Status {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Remote(status) => status,
            other => Self::unavailable(other.to_string()),
        }
    }
}
