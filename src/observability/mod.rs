//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Structured logging with per-session correlation ids
//! - Metrics are cheap (atomic increments) and recorded unconditionally;
//!   the exporter is only bound when explicitly configured

pub mod logging;
pub mod metrics;
