//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, upgrade handshake, limit check)
//!     → proxy session (owns the socket until the session ends)
//! ```

pub mod server;

pub use server::{app, AppState, HttpServer};
