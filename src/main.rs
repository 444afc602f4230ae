//! ws-stabilizer
//!
//! A stabilizing WebSocket proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                WS STABILIZER                 │
//!                    │                                              │
//!   Client WS        │  ┌─────────┐   ┌──────────┐   ┌───────────┐ │
//!   ─────────────────┼─▶│  http   │──▶│ limiter  │──▶│  session  │ │
//!                    │  │ upgrade │   │ (503 at  │   │           │ │
//!                    │  └─────────┘   │  limit)  │   └─────┬─────┘ │
//!                    │                └──────────┘         │       │
//!                    │                                     ▼       │
//!                    │                          ┌────────────────┐ │
//!                    │   client reader ◀───────▶│  backend slot  │ │      Backend
//!                    │   backend reader ◀──────▶│  (generation)  │◀┼────▶ Server
//!                    │   supervisor ────────────▶└───────────────┘ │
//!                    │        │ fault → event → redial → swap      │
//!                    │                                              │
//!                    │  ┌────────────────────────────────────────┐ │
//!                    │  │  config · lifecycle · observability    │ │
//!                    │  └────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;

use ws_stabilizer::config::{cli, ProxyConfig};
use ws_stabilizer::http::HttpServer;
use ws_stabilizer::lifecycle::{signals, Shutdown};
use ws_stabilizer::observability;

fn main() -> ExitCode {
    let config = match cli::parse_args() {
        Ok(config) => config,
        Err(code) => return code,
    };
    run(config)
}

#[tokio::main]
async fn run(config: ProxyConfig) -> ExitCode {
    observability::logging::init();

    // The CLI surface is closed; the scrape endpoint is opt-in via env.
    if let Ok(raw) = std::env::var("WS_STABILIZER_METRICS_ADDR") {
        match raw.parse::<SocketAddr>() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(metrics_address = %raw, "failed to parse metrics address")
            }
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_interrupt(shutdown.clone()));

    let listener = match TcpListener::bind(&config.listen.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                address = %config.listen.bind_address,
                error = %e,
                "failed to bind listener"
            );
            return ExitCode::from(1);
        }
    };

    let server = HttpServer::new(Arc::new(config), shutdown);
    match server.run(listener).await {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::from(1)
        }
    }
}
