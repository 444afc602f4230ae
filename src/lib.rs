//! Stabilizing WebSocket proxy.
//!
//! Keeps a client's WebSocket session alive across transient failures of
//! the upstream backend: the backend link is redialed behind the scenes
//! while in-band event frames tell the client what happened.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
