//! Busy-retry policy and the state consulted by engine callbacks.
//!
//! The engine calls the busy handler whenever a lock it needs is held by
//! another connection, and the progress handler periodically while a
//! statement evaluates. Both run on the thread that made the blocking call.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::interrupt::InterruptSignal;

/// Busy timeout installed on every new connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Virtual machine instructions between progress handler calls.
pub(crate) const PROGRESS_INTERVAL: i32 = 100;

// The engine's own backoff schedule, in milliseconds.
const DELAYS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];
const TOTALS: [u64; 12] = [0, 1, 3, 8, 18, 33, 53, 78, 103, 128, 178, 228];

/// How a connection reacts to lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Return `SQLITE_BUSY` immediately.
    Immediate,
    /// Retry with backoff until the duration elapses.
    Timeout(Duration),
    /// Retry until the interrupt signal fires.
    UntilInterrupted,
}

impl BusyPolicy {
    /// Maps a duration onto a policy; zero means [`BusyPolicy::Immediate`].
    #[must_use]
    pub const fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::Immediate
        } else {
            Self::Timeout(timeout)
        }
    }

    /// How long to sleep before retry number `count`, or `None` to give up.
    fn delay(self, count: usize) -> Option<Duration> {
        let idx = count.min(DELAYS.len() - 1);
        let delay = DELAYS[idx];
        match self {
            Self::Immediate => None,
            Self::UntilInterrupted => Some(Duration::from_millis(delay)),
            Self::Timeout(timeout) => {
                let extra = (count.saturating_sub(DELAYS.len() - 1)) as u64;
                let prior = TOTALS[idx] + extra * delay;
                let limit = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                let delay = if prior + delay > limit {
                    limit.saturating_sub(prior)
                } else {
                    delay
                };
                (delay > 0).then_some(Duration::from_millis(delay))
            }
        }
    }
}

/// Interrupt slot and busy policy shared with the native callbacks.
///
/// Lives in a stable heap allocation owned by the raw database handle so
/// the pointer registered with the engine stays valid until close.
#[derive(Debug)]
pub(crate) struct Handlers {
    interrupt: Mutex<Option<InterruptSignal>>,
    policy: Mutex<BusyPolicy>,
}

impl Handlers {
    pub(crate) const fn new() -> Self {
        Self {
            interrupt: Mutex::new(None),
            policy: Mutex::new(BusyPolicy::Timeout(DEFAULT_BUSY_TIMEOUT)),
        }
    }

    pub(crate) fn set_interrupt(&self, signal: Option<InterruptSignal>) -> Option<InterruptSignal> {
        let mut slot = self
            .interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, signal)
    }

    pub(crate) fn interrupt(&self) -> Option<InterruptSignal> {
        self.interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(InterruptSignal::is_fired)
    }

    pub(crate) fn set_policy(&self, policy: BusyPolicy) {
        *self.policy.lock().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    pub(crate) fn policy(&self) -> BusyPolicy {
        *self.policy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Busy handler body: `true` asks the engine to retry.
    pub(crate) fn on_busy(&self, count: usize) -> bool {
        let signal = self.interrupt();
        if signal.as_ref().is_some_and(InterruptSignal::is_fired) {
            return false;
        }
        let Some(delay) = self.policy().delay(count) else {
            log::trace!("busy: giving up after {count} retries");
            return false;
        };
        log::trace!("busy: retry {count} in {delay:?}");
        match signal {
            Some(signal) => !signal.wait_timeout(delay),
            None => {
                thread::sleep(delay);
                true
            }
        }
    }

    /// Progress handler body: `true` aborts the running statement.
    pub(crate) fn on_progress(&self) -> bool {
        self.is_interrupted()
    }
}
