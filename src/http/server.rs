//! HTTP server setup and the WebSocket upgrade handler.
//!
//! # Responsibilities
//! - Create the Axum router with the single upgrade endpoint
//! - Enforce the session limit before upgrading
//! - Hand upgraded sockets to proxy sessions
//! - Graceful shutdown bounded by the configured grace period

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::AcceptLimiter;
use crate::observability::metrics;
use crate::proxy::Session;

/// Application state injected into the upgrade handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub limiter: Arc<AcceptLimiter>,
    pub shutdown: Shutdown,
}

/// Build the Axum router: one catch-all upgrade endpoint at `/`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", any(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// HTTP server for the stabilizing proxy.
pub struct HttpServer {
    config: Arc<ProxyConfig>,
    shutdown: Shutdown,
    limiter: Arc<AcceptLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: Arc<ProxyConfig>, shutdown: Shutdown) -> Self {
        let limiter = AcceptLimiter::new(config.listen.max_connections);
        Self {
            config,
            shutdown,
            limiter,
        }
    }

    /// Serve until shutdown is triggered, then drain sessions within the
    /// grace period.
    pub async fn run(self, listener: TcpListener) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.url,
            max_connections = self.limiter.limit(),
            "websocket proxy listening"
        );

        let state = AppState {
            config: self.config.clone(),
            limiter: self.limiter.clone(),
            shutdown: self.shutdown.clone(),
        };
        let router = app(state).into_make_service_with_connect_info::<SocketAddr>();

        let token = self.shutdown.token();
        let grace = self.config.deadlines.shutdown_grace;
        let serve = {
            let token = token.clone();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await
            }
        };

        tokio::select! {
            result = serve => {
                tracing::info!("http server stopped");
                result
            }
            _ = async { token.cancelled().await; tokio::time::sleep(grace).await } => {
                tracing::warn!(grace = ?grace, "shutdown grace elapsed, abandoning remaining sessions");
                Ok(())
            }
        }
    }
}

/// Upgrade handler.
///
/// The limit check runs before anything else so a saturated proxy rejects
/// at the cheap HTTP layer, before per-session resources exist.
async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(permit) = state.limiter.try_acquire() else {
        tracing::warn!(
            peer = %peer,
            limit = state.limiter.limit(),
            "connection limit reached"
        );
        metrics::record_rejected_at_limit();
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "service temporarily unavailable",
        )
            .into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(peer = %peer, error = %rejection, "websocket upgrade failed");
            return rejection.into_response();
        }
    };

    let config = state.config.clone();
    let scope = state.shutdown.session_scope();
    ws.on_upgrade(move |socket| Session::run(socket, peer, headers, config, scope, permit))
}
