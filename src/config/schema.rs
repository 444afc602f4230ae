//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! Configuration is assembled from CLI flags and is immutable after startup.

use std::time::Duration;

use url::Url;

/// Root configuration for the stabilizing proxy.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listen: ListenConfig,

    /// Upstream backend configuration.
    pub backend: BackendConfig,

    /// Reconnection window and pacing.
    pub reconnect: ReconnectConfig,

    /// Session event frame payloads.
    pub events: EventConfig,

    /// Transport deadlines and shutdown grace.
    pub deadlines: DeadlineConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent client sessions. 0 means unlimited.
    pub max_connections: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 0,
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend WebSocket URL (`ws://` or `wss://`).
    pub url: Url,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            // Mirrors the default of the `--backend` flag.
            url: Url::parse("ws://localhost:80/api/ws").expect("default backend URL is valid"),
        }
    }
}

/// Reconnection window and pacing.
///
/// `dial_timeout` doubles as the per-dial budget and the total reconnection
/// window after a backend fault.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    /// Budget for a single dial and for the whole reconnection window.
    pub dial_timeout: Duration,

    /// Sleep between failed dial attempts.
    pub retry_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Payloads of the text frames injected into the client stream to signal
/// backend availability.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Sent when the backend link is lost.
    pub disconnected: String,

    /// Sent when the backend link is established or restored.
    pub connected: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            disconnected: "backend_disconnected".to_string(),
            connected: "backend_connected".to_string(),
        }
    }
}

/// Transport deadlines.
///
/// Reads are bounded so forwarding tasks observe cancellation even on a
/// silent socket; a read deadline expiry is a liveness check, not an error.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineConfig {
    /// Bound on a single frame read.
    pub read: Duration,

    /// Bound on a single frame write, including write-lock wait.
    pub write: Duration,

    /// Pause inside a backend swap so the old generation's tasks can
    /// observe cancellation before the old link is closed.
    pub quiescence: Duration,

    /// Grace period for draining sessions after an interrupt.
    pub shutdown_grace: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(30),
            write: Duration::from_secs(5),
            quiescence: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
