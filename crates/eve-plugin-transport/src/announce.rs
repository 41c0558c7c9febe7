//! Address announcement.
//!
//! A plugin launched by the host prints a single line on stdout once its
//! listener is bound:
//!
//! ```text
//! 1|2|tcp|127.0.0.1:41023|evrpc
//! ```
//!
//! The fields are the core transport version, the application protocol
//! version, the network, the address and the protocol name. A plugin started
//! by hand in debug mode publishes a [`ReattachConfig`] instead, which is then
//! registered with the host out of band.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use eve_plugin_core::HandshakeError;

/// Version of the announce line format.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Protocol name carried in the announce line.
pub const PROTOCOL_NAME: &str = "evrpc";

/// Where a running plugin can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReattachConfig {
    /// Listener address.
    pub addr: SocketAddr,
    /// Process id of the plugin.
    pub pid: u32,
}

impl ReattachConfig {
    /// Describes the current process listening on `addr`.
    pub fn current(addr: SocketAddr) -> Self {
        Self {
            addr,
            pid: std::process::id(),
        }
    }
}

/// Parsed announce line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceLine {
    pub core_version: u32,
    pub app_version: u32,
    pub network: String,
    pub addr: SocketAddr,
    pub protocol: String,
}

impl AnnounceLine {
    /// Builds the line a plugin prints for `addr`.
    pub fn new(app_version: u32, addr: SocketAddr) -> Self {
        Self {
            core_version: CORE_PROTOCOL_VERSION,
            app_version,
            network: "tcp".to_string(),
            addr,
            protocol: PROTOCOL_NAME.to_string(),
        }
    }

    /// Parses a line printed by a plugin.
    pub fn parse(line: &str) -> Result<Self, HandshakeError> {
        let malformed = || HandshakeError::MalformedAnnounce(line.trim().to_string());
        let parts: Vec<&str> = line.trim().split('|').collect();
        let [core, app, network, addr, protocol] = parts.as_slice() else {
            return Err(malformed());
        };
        Ok(Self {
            core_version: core.parse().map_err(|_| malformed())?,
            app_version: app.parse().map_err(|_| malformed())?,
            network: (*network).to_string(),
            addr: addr.parse().map_err(|_| malformed())?,
            protocol: (*protocol).to_string(),
        })
    }
}

impl fmt::Display for AnnounceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.core_version, self.app_version, self.network, self.addr, self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_line_format_and_parse() {
        let addr: SocketAddr = "127.0.0.1:41023".parse().unwrap();
        let line = AnnounceLine::new(2, addr);
        assert_eq!(line.to_string(), "1|2|tcp|127.0.0.1:41023|evrpc");

        let parsed = AnnounceLine::parse("1|2|tcp|127.0.0.1:41023|evrpc\n").unwrap();
        assert_eq!(parsed, line);
    }

    #[test]
    fn test_malformed_announce_line() {
        assert!(AnnounceLine::parse("1|2|tcp").is_err());
        assert!(AnnounceLine::parse("x|2|tcp|127.0.0.1:1|evrpc").is_err());
        assert!(AnnounceLine::parse("1|2|tcp|not-an-addr|evrpc").is_err());
    }

    #[test]
    fn test_reattach_config_uses_current_pid() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let config = ReattachConfig::current(addr);
        assert_eq!(config.pid, std::process::id());
        assert_eq!(config.addr, addr);
    }
}
