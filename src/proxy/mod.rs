//! The per-session proxy core.
//!
//! # Data Flow
//! ```text
//! Upgraded client socket
//!     → session.rs (assemble session, initial dial, supervisor)
//!     → slot.rs (current backend generation, serialized swaps)
//!     → forward.rs (client reader ⇄ backend reader, fault channel)
//!     → dial.rs (handshake with forwarded headers, bounded reconnect)
//!     → link.rs / message.rs (deadline-bounded I/O, frame conversion)
//! ```
//!
//! # Session states
//! ```text
//!           dial OK              fault
//! INIT ─────────────────► LIVE ─────────► RECONNECTING
//!           dial FAIL                     │
//!              │                          │ reconnect OK
//!              ▼                          ▼
//!            DEAD ◄───────────────────── LIVE'
//!                    client gone │ reconnect fail │ shutdown
//! ```
//!
//! # Design Decisions
//! - One generation at a time: the old pair of forwarding tasks is
//!   cancelled, joined and its link closed before a replacement is visible
//! - Frames in flight while the backend is down are dropped, not buffered
//! - Cancellation is hierarchical (session ⊃ generation) and observed
//!   between bounded read deadlines, so tasks exit promptly even on a
//!   silent socket

mod dial;
mod forward;
mod link;
mod message;
mod session;
mod slot;

pub use session::Session;
