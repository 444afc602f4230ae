//! The swappable backend connection slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

use crate::proxy::link::BackendLink;

/// One backend link instance plus the cancellation scope shared by its pair
/// of forwarding tasks.
///
/// Tasks capture their generation at spawn time; the link is reached only
/// through it, never through a fresh slot read at write time.
pub(crate) struct Generation {
    id: u64,
    link: Arc<BackendLink>,
    scope: CancellationToken,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn link(&self) -> &Arc<BackendLink> {
        &self.link
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    pub fn cancel(&self) {
        self.scope.cancel();
    }
}

#[derive(Debug, Error)]
pub(crate) enum SlotError {
    #[error("session closed")]
    SessionClosed,
}

/// Holder of the current backend generation.
///
/// Only the supervisor mutates the slot; swaps are serialized by the write
/// lock. The generation scope is a child of the session scope, so session
/// cancellation reaches every generation but a generation swap never
/// disturbs the session.
pub(crate) struct BackendSlot {
    current: RwLock<Option<Arc<Generation>>>,
    session: CancellationToken,
    next_id: AtomicU64,
    quiescence: Duration,
}

impl BackendSlot {
    pub fn new(session: CancellationToken, quiescence: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            session,
            next_id: AtomicU64::new(0),
            quiescence,
        }
    }

    fn next_generation(&self, link: BackendLink) -> Arc<Generation> {
        Arc::new(Generation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            link: Arc::new(link),
            scope: self.session.child_token(),
        })
    }

    /// Install the first backend link. Fails once the session is cancelled.
    pub async fn install(&self, link: BackendLink) -> Result<Arc<Generation>, SlotError> {
        let mut slot = self.current.write().await;
        if self.session.is_cancelled() {
            link.close(CloseCode::Normal, "").await;
            return Err(SlotError::SessionClosed);
        }
        let generation = self.next_generation(link);
        *slot = Some(generation.clone());
        Ok(generation)
    }

    /// Swap in a fresh backend link.
    ///
    /// The old generation is cancelled and given a quiescence pause so its
    /// tasks leave their in-flight read or write before the old link is
    /// closed; only then does the new generation become visible.
    pub async fn replace(&self, link: BackendLink) -> Result<Arc<Generation>, SlotError> {
        let mut slot = self.current.write().await;
        if let Some(old) = slot.take() {
            old.scope.cancel();
            tokio::time::sleep(self.quiescence).await;
            old.link.close(CloseCode::Normal, "").await;
        }
        if self.session.is_cancelled() {
            link.close(CloseCode::Normal, "").await;
            return Err(SlotError::SessionClosed);
        }
        let generation = self.next_generation(link);
        *slot = Some(generation.clone());
        Ok(generation)
    }

    /// The current generation, if any.
    pub async fn snapshot(&self) -> Option<Arc<Generation>> {
        self.current.read().await.clone()
    }

    /// Cancel and close whatever generation is installed.
    pub async fn close(&self) {
        let mut slot = self.current.write().await;
        if let Some(old) = slot.take() {
            old.scope.cancel();
            old.link.close(CloseCode::Normal, "").await;
        }
    }
}
