//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Parse flags → Validate → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel sessions → Drain within grace
//!
//! Signals (signals.rs):
//!     SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Shutdown fans out through a cancellation-token hierarchy: process ⊃
//!   session ⊃ backend generation
//! - Draining is bounded by a shutdown grace period; the process never hangs
//!   on a stuck session

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
