//! Shutdown coordination for the proxy.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps the root cancellation token. Sessions derive child scopes from it,
/// so triggering shutdown cancels every session (and through them, every
/// backend generation) without any session being able to cancel its siblings.
#[derive(Clone)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.root.cancel();
    }

    /// A handle on the root token, for the HTTP server's graceful-shutdown
    /// future.
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Derive a cancellation scope for one client session.
    pub fn session_scope(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
