//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags
//!     → cli.rs (parse flags, fold into ProxyConfig)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server starts; there is no reload path
//! - All fields except the listen address have defaults
//! - Validation separates syntactic (clap) from semantic checks

pub mod cli;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use schema::{DeadlineConfig, EventConfig, ProxyConfig, ReconnectConfig};
