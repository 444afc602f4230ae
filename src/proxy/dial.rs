//! Backend dialing and reconnection.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::config::ProxyConfig;
use crate::proxy::link::BackendLink;

#[derive(Debug, Error)]
pub(crate) enum DialError {
    #[error("backend dial timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend rejected handshake with status {0}")]
    Rejected(StatusCode),
    #[error("backend handshake failed: {0}")]
    Handshake(#[from] WsError),
    #[error("no successful dial within the reconnection window")]
    ReconnectTimeout,
}

/// Headers never forwarded to the backend handshake.
///
/// `Connection`, `Upgrade` and the `Sec-WebSocket-*` family are regenerated
/// by the dialer; `Host` is derived from the backend URL.
fn is_handshake_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION
        || *name == header::UPGRADE
        || *name == header::HOST
        || name.as_str().starts_with("sec-websocket-")
}

/// The subset of client headers that is forwarded to the backend.
pub(crate) fn filter_headers(client_headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in client_headers {
        if !is_handshake_header(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

/// Dial the backend once, with `budget` covering both the TCP connect and
/// the WebSocket handshake.
pub(crate) async fn dial(
    config: &ProxyConfig,
    client_headers: &HeaderMap,
    budget: Duration,
) -> Result<BackendLink, DialError> {
    let mut request = config.backend.url.as_str().into_client_request()?;
    for (name, value) in &filter_headers(client_headers) {
        request.headers_mut().append(name.clone(), value.clone());
    }

    match timeout(budget, connect_async(request)).await {
        Err(_) => {
            tracing::debug!(backend = %config.backend.url, budget = ?budget, "backend dial timed out");
            Err(DialError::Timeout(budget))
        }
        Ok(Err(WsError::Http(response))) => {
            let status = response.status();
            tracing::debug!(backend = %config.backend.url, status = %status, "backend rejected handshake");
            Err(DialError::Rejected(status))
        }
        Ok(Err(e)) => {
            tracing::debug!(backend = %config.backend.url, error = %e, "backend dial failed");
            Err(DialError::Handshake(e))
        }
        Ok(Ok((socket, _response))) => Ok(BackendLink::new(socket, config.deadlines.write)),
    }
}

/// Retry `dial` until `deadline`, each attempt bounded by the remaining
/// window, sleeping the configured backoff between attempts.
///
/// Only the first failed attempt of a cycle is logged at info level.
pub(crate) async fn reconnect(
    config: &ProxyConfig,
    client_headers: &HeaderMap,
    deadline: Instant,
) -> Result<BackendLink, DialError> {
    let mut first_failure_logged = false;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DialError::ReconnectTimeout);
        }

        match dial(config, client_headers, remaining).await {
            Ok(link) => {
                tracing::info!(backend = %config.backend.url, "reconnected to backend");
                return Ok(link);
            }
            Err(e) => {
                if !first_failure_logged {
                    tracing::info!(backend = %config.backend.url, error = %e, "reconnecting to backend");
                    first_failure_logged = true;
                }
            }
        }

        sleep(config.reconnect.retry_backoff).await;
    }
}
