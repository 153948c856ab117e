//! A futex-style completion event: an atomic 32-bit state cell that threads
//! can park on until the cell reaches a value they are interested in.
//!
//! See the documentation for the [`CompletionEvent`] type for details.
use crate::{
    loom::sync::{
        atomic::{AtomicU32, Ordering::*},
        Condvar, Mutex, MutexGuard,
    },
    util::{fmt, CachePadded},
};
#[cfg(not(loom))]
use std::time::{Duration, Instant};

/// An atomic 32-bit state cell with futex-like waiting.
///
/// The cell's value is published with [`notify`], which stores with release
/// ordering and wakes every parked waiter; [`wait`] and the timed variants
/// park the calling thread until an acquire load observes the value they
/// were asked for. The raw state word is exposed through [`state`] so that
/// a primitive built on top of the event can use the same cell for its own
/// transitions (a future's status word and a task group's outstanding count
/// both live in one of these).
///
/// Waiters only take the internal lock on the slow path; a completed event
/// is observed with a single atomic load.
///
/// [`notify`]: Self::notify
/// [`wait`]: Self::wait
/// [`state`]: Self::state
pub struct CompletionEvent {
    state: CachePadded<AtomicU32>,
    lock: Mutex<()>,
    waiters: Condvar,
}

// === impl CompletionEvent ===

impl CompletionEvent {
    loom_const_fn! {
        /// Returns a new event holding `initial`.
        #[must_use]
        pub fn new(initial: u32) -> Self {
            Self {
                state: CachePadded::new(AtomicU32::new(initial)),
                lock: Mutex::new(()),
                waiters: Condvar::new(),
            }
        }
    }

    /// Returns a reference to the raw state cell.
    ///
    /// Stores through this reference do *not* wake waiters; use [`notify`]
    /// (or [`wake_all`] after the store) to publish a value that another
    /// thread may be parked on.
    ///
    /// [`notify`]: Self::notify
    /// [`wake_all`]: Self::wake_all
    #[inline]
    pub fn state(&self) -> &AtomicU32 {
        &self.state
    }

    /// Stores `value` with release ordering and wakes every waiter.
    pub fn notify(&self, value: u32) {
        test_debug!(event = ?fmt::ptr(self), value, "CompletionEvent::notify");
        self.state.store(value, Release);
        self.wake_all();
    }

    /// Wakes every parked waiter without changing the state.
    ///
    /// The waiters re-check the state and go back to sleep if it is not yet
    /// the value they are waiting for.
    pub fn wake_all(&self) {
        // Taking the lock orders this wakeup after any waiter that checked
        // the state but has not yet parked.
        let _guard = self.locked();
        self.waiters.notify_all();
    }

    /// Blocks the calling thread until the state is `value`.
    pub fn wait(&self, value: u32) {
        if self.state.load(Acquire) == value {
            return;
        }
        test_debug!(event = ?fmt::ptr(self), value, "CompletionEvent::wait: parking");
        let mut guard = self.locked();
        while self.state.load(Acquire) != value {
            guard = self
                .waiters
                .wait(guard)
                .expect("event lock is never poisoned");
        }
    }

    /// Blocks the calling thread until the state is `value`, or until
    /// `timeout` has elapsed.
    ///
    /// Returns `true` if the value was observed, `false` on timeout.
    #[cfg(not(loom))]
    pub fn wait_for(&self, value: u32, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(value, deadline),
            // The timeout is not representable; treat it as forever.
            None => {
                self.wait(value);
                true
            }
        }
    }

    /// Blocks the calling thread until the state is `value`, or until
    /// `deadline` has passed.
    ///
    /// Returns `true` if the value was observed, `false` on timeout.
    #[cfg(not(loom))]
    pub fn wait_until(&self, value: u32, deadline: Instant) -> bool {
        if self.state.load(Acquire) == value {
            return true;
        }
        let mut guard = self.locked();
        loop {
            if self.state.load(Acquire) == value {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let (next, _timed_out) = self
                .waiters
                .wait_timeout(guard, remaining)
                .expect("event lock is never poisoned");
            guard = next;
        }
    }

    fn locked(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().expect("event lock is never poisoned")
    }
}

impl fmt::Debug for CompletionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionEvent")
            .field("state", &self.state.load(Relaxed))
            .finish_non_exhaustive()
    }
}
