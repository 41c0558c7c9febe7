//! Handshake contract shared by host and plugin.
//!
//! Both peers must agree on the protocol version and the magic cookie before
//! any capability becomes callable. The plugin checks the cookie twice:
//!
//! 1. At startup, in the environment variable named by the cookie key (the
//!    host sets it when spawning the plugin process).
//! 2. On every accepted connection, in the [`Hello`] message that must open
//!    the conversation.
//!
//! # Example
//!
//! ```rust,ignore
//! use eve_plugin_core::handshake::{HANDSHAKE, Hello};
//!
//! let hello = Hello::from_config(&HANDSHAKE);
//! HANDSHAKE.verify_hello(&hello)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::HandshakeError;

/// Version of the application protocol spoken over the transport.
pub const PROTOCOL_VERSION: u32 = 2;

/// Name of the environment variable carrying the magic cookie.
pub const MAGIC_COOKIE_KEY: &str = "ev_author";

/// Expected value of the magic cookie.
pub const MAGIC_COOKIE_VALUE: &str = "xiaowenlong";

/// The handshake triple every host and plugin of this SDK share.
pub const HANDSHAKE: HandshakeConfig = HandshakeConfig {
    protocol_version: PROTOCOL_VERSION,
    cookie_key: MAGIC_COOKIE_KEY,
    cookie_value: MAGIC_COOKIE_VALUE,
};

/// Immutable protocol identity used during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Application protocol version.
    pub protocol_version: u32,
    /// Magic cookie key.
    pub cookie_key: &'static str,
    /// Magic cookie value.
    pub cookie_value: &'static str,
}

impl HandshakeConfig {
    /// Verifies the magic cookie using the process environment.
    pub fn verify_env(&self) -> Result<(), HandshakeError> {
        self.verify_env_with(|key| std::env::var(key).ok())
    }

    /// Verifies the magic cookie with a custom variable lookup.
    pub fn verify_env_with<F>(&self, lookup: F) -> Result<(), HandshakeError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(self.cookie_key) {
            None => Err(HandshakeError::CookieMissing {
                key: self.cookie_key.to_string(),
            }),
            Some(value) if value == self.cookie_value => Ok(()),
            Some(_) => Err(HandshakeError::CookieMismatch {
                key: self.cookie_key.to_string(),
            }),
        }
    }

    /// Verifies the opening message of a connection.
    pub fn verify_hello(&self, hello: &Hello) -> Result<(), HandshakeError> {
        if hello.protocol_version != self.protocol_version {
            return Err(HandshakeError::VersionMismatch {
                expected: self.protocol_version,
                actual: hello.protocol_version,
            });
        }
        if hello.cookie_key != self.cookie_key || hello.cookie_value != self.cookie_value {
            return Err(HandshakeError::CookieMismatch {
                key: hello.cookie_key.clone(),
            });
        }
        Ok(())
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        HANDSHAKE
    }
}

/// Opening message a host sends on every new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Protocol version spoken by the host.
    pub protocol_version: u32,
    /// Magic cookie key.
    pub cookie_key: String,
    /// Magic cookie value.
    pub cookie_value: String,
}

impl Hello {
    /// Builds the hello message matching `config`.
    pub fn from_config(config: &HandshakeConfig) -> Self {
        Self {
            protocol_version: config.protocol_version,
            cookie_key: config.cookie_key.to_string(),
            cookie_value: config.cookie_value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_constants() {
        assert_eq!(HANDSHAKE.protocol_version, 2);
        assert_eq!(HANDSHAKE.cookie_key, "ev_author");
        assert_eq!(HANDSHAKE.cookie_value, "xiaowenlong");
    }

    #[test]
    fn test_verify_env_accepts_matching_cookie() {
        let result = HANDSHAKE.verify_env_with(|key| {
            assert_eq!(key, "ev_author");
            Some("xiaowenlong".to_string())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_verify_env_rejects_missing_and_wrong_cookie() {
        let missing = HANDSHAKE.verify_env_with(|_| None);
        assert!(matches!(missing, Err(HandshakeError::CookieMissing { .. })));

        let wrong = HANDSHAKE.verify_env_with(|_| Some("someone-else".to_string()));
        assert!(matches!(wrong, Err(HandshakeError::CookieMismatch { .. })));
    }

    #[test]
    fn test_verify_hello_checks_every_field() {
        let good = Hello::from_config(&HANDSHAKE);
        assert!(HANDSHAKE.verify_hello(&good).is_ok());

        let old = Hello {
            protocol_version: 1,
            ..good.clone()
        };
        assert_eq!(
            HANDSHAKE.verify_hello(&old),
            Err(HandshakeError::VersionMismatch {
                expected: 2,
                actual: 1
            })
        );

        let wrong_key = Hello {
            cookie_key: "other".to_string(),
            ..good.clone()
        };
        assert!(HANDSHAKE.verify_hello(&wrong_key).is_err());

        let wrong_value = Hello {
            cookie_value: "other".to_string(),
            ..good
        };
        assert!(HANDSHAKE.verify_hello(&wrong_value).is_err());
    }
}
