//! Process-wide session accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter bounding concurrent client sessions.
///
/// The HTTP handler consults this before upgrading, so a saturated proxy
/// rejects at the cheap HTTP layer instead of allocating per-session
/// resources. A limit of 0 means unlimited.
pub struct AcceptLimiter {
    active: AtomicUsize,
    limit: usize,
}

impl AcceptLimiter {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            limit,
        })
    }

    /// Reserve a session slot. Returns `None` when the limit is reached.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionPermit> {
        if self.limit == 0 {
            self.active.fetch_add(1, Ordering::AcqRel);
        } else {
            let mut current = self.active.load(Ordering::Acquire);
            loop {
                if current >= self.limit {
                    return None;
                }
                match self.active.compare_exchange_weak(
                    current,
                    current + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(observed) => current = observed,
                }
            }
        }
        Some(SessionPermit {
            limiter: Arc::clone(self),
        })
    }

    /// Number of live sessions.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Configured limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// A reserved session slot.
///
/// Dropping the permit releases the slot, so the count stays accurate even
/// if the session task panics.
pub struct SessionPermit {
    limiter: Arc<AcceptLimiter>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.limiter.active.fetch_sub(1, Ordering::AcqRel);
    }
}
