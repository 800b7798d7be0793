use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

/// Timeouts shorter than this are busy-polled instead of sleeping.
pub const BUSY_POLL_THRESHOLD: Duration = Duration::from_micros(1);

/// A single slot recording that an edge happened since the last wait.
///
/// Producers never queue: while a token is pending further notifications are
/// dropped, so only the occurrence of an edge is kept, not the count.
#[derive(Debug, Default)]
pub struct EdgeSignal {
    pending: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl EdgeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge. Never waits on a consumer.
    pub fn notify(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        // Waiters check the slot under this lock, taking it here means a
        // waiter is either before its check or already parked.
        let _guard = self.lock.lock();
        self.cond.notify_one();
    }

    /// Consume the pending token, if any.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Wait for an edge, consuming it.
    ///
    /// `None` waits until notified. Timeouts below [`BUSY_POLL_THRESHOLD`]
    /// spin on the slot, a zero timeout still observes a pending edge.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let Some(timeout) = timeout else {
            let mut guard = self.lock.lock();
            loop {
                if self.take() {
                    return true;
                }
                self.cond.wait(&mut guard);
            }
        };

        let start = Instant::now();
        let Some(deadline) = start.checked_add(timeout) else {
            return self.wait(None);
        };

        if timeout < BUSY_POLL_THRESHOLD {
            loop {
                if self.take() {
                    return true;
                }
                if Instant::now() >= deadline {
                    return false;
                }
                std::hint::spin_loop();
            }
        }

        let mut guard = self.lock.lock();
        loop {
            if self.take() {
                return true;
            }
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return self.take();
            }
        }
    }
}
