// src/dag/cancel.rs

//! Cooperative cancellation of blocked waiters.
//!
//! Threads cannot be interrupted, so a worker that may block inside
//! [`ConcurrentResolver::acquire_free_cancellable`] is handed a
//! [`CancelToken`] instead. Cancelling the token wakes every resolver the
//! token has been waiting on; the waiting call then fails with
//! [`ResolveError::Cancelled`] and the token stays cancelled so the caller
//! can propagate it.
//!
//! [`ConcurrentResolver::acquire_free_cancellable`]: crate::dag::ConcurrentResolver::acquire_free_cancellable
//! [`ResolveError::Cancelled`]: crate::errors::ResolveError::Cancelled

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

/// Something with blocked waiters that must re-check their condition.
pub(crate) trait WakeWaiters: Send + Sync {
    /// Wake every waiter. Implementations must take the lock the waiters
    /// wait on, so a waiter that has checked the token but not yet started
    /// waiting cannot miss the wake-up.
    fn wake_all(&self);
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn WakeWaiters>>>,
}

/// Cloneable cancellation signal shared between an orchestrator and its
/// workers.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every registered waiter. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("cancellation requested");

        // Collect first so no waiter's lock is taken while holding ours.
        let waiters: Vec<Arc<dyn WakeWaiters>> = self
            .inner
            .waiters
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for waiter in waiters {
            waiter.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a resolver to be woken on cancellation. Must happen before
    /// the waiter first checks [`CancelToken::is_cancelled`].
    pub(crate) fn register(&self, waiter: Weak<dyn WakeWaiters>) {
        let mut waiters = self.inner.waiters.lock();
        waiters.retain(|w| w.strong_count() > 0);
        if !waiters.iter().any(|w| Weak::ptr_eq(w, &waiter)) {
            waiters.push(waiter);
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
