//! Configuration validation logic.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "listen address '{}' is not a valid host:port",
            config.listen.bind_address
        )));
    }

    match config.backend.url.scheme() {
        "ws" | "wss" => {}
        other => errors.push(ValidationError(format!(
            "backend URL scheme '{other}' is not a WebSocket scheme"
        ))),
    }

    if config.reconnect.dial_timeout.is_zero() {
        errors.push(ValidationError("dial-timeout must be positive".to_string()));
    }
    if config.reconnect.retry_backoff.is_zero() {
        errors.push(ValidationError("retry-backoff must be positive".to_string()));
    }

    if config.events.disconnected.is_empty() || config.events.connected.is_empty() {
        errors.push(ValidationError("event names must not be empty".to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
