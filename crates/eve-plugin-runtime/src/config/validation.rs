//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{HostConfig, LogOutput, LoggingConfig, PluginConfig, TransportConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PluginConfig) -> ConfigResult<()> {
    validate_host(&config.host)?;
    validate_transport(&config.transport)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_host(host: &HostConfig) -> ConfigResult<()> {
    if host.address.is_empty() {
        return Err(ConfigError::missing_field("host.address"));
    }
    if host.rpc_port == 0 {
        return Err(ConfigError::validation("host.rpc_port must not be 0"));
    }
    if host.request_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "host.request_timeout_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_transport(transport: &TransportConfig) -> ConfigResult<()> {
    transport.bind_addr()?;

    if transport.max_receive_message_size == 0 {
        return Err(ConfigError::validation(
            "transport.max_receive_message_size must be greater than 0",
        ));
    }
    if transport.max_send_message_size == Some(0) {
        return Err(ConfigError::validation(
            "transport.max_send_message_size must be greater than 0 when set",
        ));
    }
    if transport.handshake_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "transport.handshake_timeout_ms must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
