//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → axum listener (HTTP/1.1, upgrade handshake)
//!     → limiter.rs (session slot or 503)
//!     → Hand off to the proxy session
//! ```

pub mod limiter;

pub use limiter::{AcceptLimiter, SessionPermit};
