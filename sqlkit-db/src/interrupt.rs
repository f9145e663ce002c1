//! Cancellation signal for in-flight and future engine calls.
//!
//! An [`InterruptSignal`] is single-shot: once [`fire`](InterruptSignal::fire)
//! is called it stays fired. Installing it on a connection with
//! [`Connection::set_interrupt`](crate::Connection::set_interrupt) makes
//! every subsequent native call on that connection fail with
//! `SQLITE_INTERRUPT`, aborts long-running evaluation through the progress
//! handler, and wakes any busy wait early. Clearing the signal (installing
//! `None` or a fresh signal) lets the connection proceed again.
//!
//! The signal may be cloned and fired from any thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    fired: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// A cloneable, single-shot cancellation token.
#[derive(Clone, Default)]
pub struct InterruptSignal {
    inner: Arc<Inner>,
}

impl InterruptSignal {
    /// Creates an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal and wakes every waiter.
    pub fn fire(&self) {
        self.inner.fired.store(true, Ordering::SeqCst);
        let _guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.wake.notify_all();
    }

    /// Whether [`fire`](Self::fire) has been called.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Blocks for up to `timeout` or until the signal fires.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (_guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |_| !self.is_fired())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_fired()
    }

    /// Whether two handles refer to the same signal.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for InterruptSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}
