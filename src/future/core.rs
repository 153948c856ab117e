//! The shared state machine behind a [`Future`](super::Future) handle.
use super::chain::{Continuation, ThenChain};
#[cfg(not(loom))]
use super::WaitStatus;
use crate::{
    event::CompletionEvent,
    loom::{cell::UnsafeCell, sync::Arc},
    task_set::TaskCounter,
    util::{fmt, Backoff},
};
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
#[cfg(not(loom))]
use std::time::{Duration, Instant};

use crate::loom::sync::atomic::Ordering::*;

/// The producer has not been started.
const NOT_STARTED: u32 = 0;
/// A thread won the race to run the producer and has not yet finished.
const RUNNING: u32 = 1;
/// The result slot is written and published.
const READY: u32 = 2;

/// The shared state of one future.
///
/// The status cell advances monotonically `NOT_STARTED → RUNNING → READY`;
/// the `RUNNING` transition is a CAS that at most one thread ever wins, and
/// that thread is the only one to touch the result slot until `READY` is
/// published on the same cell with release ordering. Waiting, installing
/// continuations, and re-running are all coordinated through the status
/// cell and the continuation chain without locks.
pub(super) struct Core<R> {
    status: CompletionEvent,
    chain: ThenChain,
    /// Whether a waiter may run the producer on its own thread while the
    /// status is still `NOT_STARTED`.
    allow_inline: bool,
    /// The task group this future is attached to, if any. Decremented
    /// exactly once, after `READY` is published.
    group: Option<Arc<TaskCounter>>,
    slot: UnsafeCell<Slot<R>>,
}

enum Slot<R> {
    /// The producer, waiting to be consumed by the `RUNNING` transition.
    Producer(Box<dyn FnOnce() -> R + Send>),
    /// The producer is executing.
    Empty,
    /// The producer's result.
    Value(R),
    /// The payload the producer panicked with.
    Panicked(Box<dyn Any + Send>),
}

// The slot is written only by the thread that wins the `RUNNING` CAS, and
// read only after an acquire load observes `READY`, so sharing a core
// requires exactly what sharing `R` itself would.
unsafe impl<R: Send> Send for Core<R> {}
unsafe impl<R: Send + Sync> Sync for Core<R> {}

// === impl Core ===

impl<R> Core<R> {
    pub(super) fn new(
        producer: Box<dyn FnOnce() -> R + Send>,
        allow_inline: bool,
        group: Option<Arc<TaskCounter>>,
    ) -> Self {
        Self {
            status: CompletionEvent::new(NOT_STARTED),
            chain: ThenChain::new(),
            allow_inline,
            group,
            slot: UnsafeCell::new(Slot::Producer(producer)),
        }
    }

    /// Returns a core that is already ready, holding `value`.
    ///
    /// No other thread can observe the core yet, so the status store is
    /// relaxed.
    pub(super) fn new_ready(value: R) -> Self {
        Self {
            status: CompletionEvent::new(READY),
            chain: ThenChain::new(),
            allow_inline: false,
            group: None,
            slot: UnsafeCell::new(Slot::Value(value)),
        }
    }

    #[inline]
    pub(super) fn ready(&self) -> bool {
        self.status.state().load(Relaxed) == READY
    }

    /// Attempts the `NOT_STARTED → RUNNING` transition, running the
    /// producer to completion on this thread if it is won.
    ///
    /// Returns `false` if another thread already ran (or is running) the
    /// producer.
    pub(super) fn try_run(&self) -> bool {
        let mut state = test_dbg!(self.status.state().load(Relaxed));
        let mut boff = Backoff::new();
        while state == NOT_STARTED {
            match self
                .status
                .state()
                .compare_exchange_weak(NOT_STARTED, RUNNING, Relaxed, Relaxed)
            {
                Ok(_) => {
                    self.execute();
                    return true;
                }
                Err(actual) => {
                    state = actual;
                    boff.spin();
                }
            }
        }
        test_trace!(state, "Core::try_run: lost the race");
        false
    }

    /// Runs the producer, publishes the result, and drains the chain.
    ///
    /// Only called by the thread that won the `RUNNING` CAS.
    fn execute(&self) {
        test_debug!(core = ?fmt::ptr(self), "Core::execute");
        let producer = self.slot.with_mut(|slot| {
            match mem::replace(unsafe { &mut *slot }, Slot::Empty) {
                Slot::Producer(producer) => producer,
                _ => unreachable!("only the thread that won the run can take the producer"),
            }
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(producer));
        self.slot.with_mut(|slot| unsafe {
            *slot = match outcome {
                Ok(value) => Slot::Value(value),
                Err(payload) => Slot::Panicked(payload),
            };
        });

        self.status.notify(READY);

        // Decrementing after the status is published is what lets a group
        // wait imply per-future readiness.
        if let Some(group) = &self.group {
            group.complete();
        }

        self.drain();
    }

    /// Blocks until the core is ready, running the producer inline if this
    /// core permits it and no one else has started it.
    pub(super) fn wait(&self) {
        if self.wait_fast() {
            return;
        }
        self.status.wait(READY);
    }

    #[cfg(not(loom))]
    pub(super) fn wait_for(&self, timeout: Duration) -> WaitStatus {
        if self.wait_fast() || self.status.wait_for(READY, timeout) {
            WaitStatus::Ready
        } else {
            WaitStatus::Timeout
        }
    }

    #[cfg(not(loom))]
    pub(super) fn wait_until(&self, deadline: Instant) -> WaitStatus {
        if self.wait_fast() || self.status.wait_until(READY, deadline) {
            WaitStatus::Ready
        } else {
            WaitStatus::Timeout
        }
    }

    fn wait_fast(&self) -> bool {
        let state = test_dbg!(self.status.state().load(Acquire));
        state == READY || (self.allow_inline && state == NOT_STARTED && self.try_run())
    }

    /// Installs a continuation to run when this core becomes ready, or runs
    /// it here and now if the core already is.
    ///
    /// The second status check covers the race in which the completing
    /// thread drained the chain between our first check and our push: the
    /// push's CAS read the drain's swap, so if that happened, the check is
    /// guaranteed to observe `READY` and we drain the chain ourselves.
    pub(super) fn enqueue_or_run(&self, thunk: impl FnOnce() + Send + 'static) {
        if self.status.state().load(Acquire) == READY {
            test_trace!("Core::enqueue_or_run: already ready");
            thunk();
            return;
        }

        self.chain.push(Continuation::new(Box::new(thunk)));

        if self.status.state().load(Acquire) == READY {
            self.drain();
        }
    }

    /// Detaches and runs the continuation chain until it stays empty.
    fn drain(&self) {
        loop {
            let mut drained = 0;
            for cont in self.chain.take_all() {
                cont.invoke();
                drained += 1;
            }
            test_trace!(drained, "Core::drain");
            if drained == 0 {
                return;
            }
        }
    }

    /// Reads the result slot.
    ///
    /// The caller must have observed `READY` (with acquire ordering), which
    /// both publishes the slot and guarantees no further writes to it.
    pub(super) fn value(&self) -> &R {
        debug_assert!(self.ready(), "result slot read before completion");
        self.slot.with(|slot| match unsafe { &*slot } {
            Slot::Value(value) => value,
            Slot::Panicked(payload) => {
                panic!("future producer panicked: {}", panic_message(&**payload))
            }
            _ => unreachable!("a ready future must have a written result slot"),
        })
    }
}

impl<R> fmt::Debug for Core<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("status", &self.status)
            .field("allow_inline", &self.allow_inline)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string payload>"
    }
}
