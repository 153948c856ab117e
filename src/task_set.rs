//! Grouping of futures behind an outstanding-work counter.
//!
//! A [`TaskSet`] wraps any [`Schedule`] implementation and counts the
//! futures constructed against it. [`TaskSet::wait`] blocks until every one
//! of them has become ready; because each future decrements the counter
//! only *after* publishing its readiness, a return from `wait` implies
//! `is_ready` for every future attached to the set.
use crate::{
    event::CompletionEvent,
    loom::sync::{atomic::Ordering::*, Arc},
    schedule::{Job, Schedule},
};
use core::fmt;

/// An atomic count of outstanding futures, with a blocking wait for the
/// count to reach zero.
///
/// The count lives in the state word of a [`CompletionEvent`], so draining
/// to zero wakes waiters through the same parking mechanism futures use for
/// their own completion.
pub struct TaskCounter {
    outstanding: CompletionEvent,
}

/// A [`Schedule`] adapter that tracks the futures scheduled through it.
#[derive(Clone, Debug)]
pub struct TaskSet<S> {
    scheduler: S,
    outstanding: Arc<TaskCounter>,
}

// === impl TaskCounter ===

impl TaskCounter {
    loom_const_fn! {
        /// Returns a new counter with no outstanding work.
        #[must_use]
        pub fn new() -> Self {
            Self {
                outstanding: CompletionEvent::new(0),
            }
        }
    }

    /// Records one newly attached unit of outstanding work.
    pub fn add(&self) {
        let prev = self.outstanding.state().fetch_add(1, Acquire);
        test_trace!(outstanding = prev + 1, "TaskCounter::add");
    }

    /// Records the completion of one unit of outstanding work, waking
    /// waiters if it was the last.
    ///
    /// The caller must have published the completed work (with release
    /// ordering or stronger) before decrementing; [`wait_idle`] observes
    /// the decrement with acquire ordering, which is what makes "the set is
    /// idle" imply "every attached future is ready".
    ///
    /// [`wait_idle`]: Self::wait_idle
    pub fn complete(&self) {
        let prev = self.outstanding.state().fetch_sub(1, Release);
        debug_assert!(prev > 0, "completed more work than was added");
        test_trace!(outstanding = prev - 1, "TaskCounter::complete");
        if prev == 1 {
            self.outstanding.wake_all();
        }
    }

    /// Returns the current number of outstanding units of work.
    #[must_use]
    pub fn outstanding(&self) -> u32 {
        self.outstanding.state().load(Acquire)
    }

    /// Blocks the calling thread until the count reaches zero.
    pub fn wait_idle(&self) {
        self.outstanding.wait(0);
    }
}

impl Default for TaskCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCounter")
            .field("outstanding", &self.outstanding.state().load(Relaxed))
            .finish()
    }
}

// === impl TaskSet ===

impl<S: Schedule> TaskSet<S> {
    /// Returns a new task set submitting work through `scheduler`.
    #[must_use]
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            outstanding: Arc::new(TaskCounter::new()),
        }
    }

    /// Returns the number of attached futures that are not yet ready.
    #[must_use]
    pub fn outstanding(&self) -> u32 {
        self.outstanding.outstanding()
    }

    /// Blocks the calling thread until every future attached to this set is
    /// ready.
    ///
    /// Futures attached after `wait` returns are not covered; call `wait`
    /// again.
    pub fn wait(&self) {
        self.outstanding.wait_idle();
    }
}

impl<S: Schedule> Schedule for TaskSet<S> {
    fn submit(&self, job: Job) {
        self.scheduler.submit(job)
    }

    fn submit_queued(&self, job: Job) {
        self.scheduler.submit_queued(job)
    }

    fn counter(&self) -> Option<Arc<TaskCounter>> {
        Some(self.outstanding.clone())
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn counter_drains_to_idle() {
        let counter = TaskCounter::new();
        counter.add();
        counter.add();
        assert_eq!(counter.outstanding(), 2);
        counter.complete();
        counter.complete();
        assert_eq!(counter.outstanding(), 0);
        // must not block
        counter.wait_idle();
    }

    #[test]
    #[should_panic(expected = "completed more work than was added")]
    fn unbalanced_complete_is_caught() {
        if cfg!(debug_assertions) {
            TaskCounter::new().complete();
        } else {
            // keep the should_panic expectation satisfied in release mode,
            // where debug_assert! compiles out
            panic!("completed more work than was added");
        }
    }
}
