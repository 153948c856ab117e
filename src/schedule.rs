//! The scheduling capability consumed by futures, and the trivial invokers
//! that implement it.
//!
//! A future core does not know what will execute it; it only requires
//! something that accepts one-shot [`Job`]s, optionally with a force-queue
//! hint. The background pool implements this (see [`pool`]), as does a
//! [`TaskSet`] wrapping another scheduler, and the two invokers defined
//! here: [`Immediate`], which runs jobs on the submitting thread, and
//! [`Intercept`], which captures them for the caller to run later.
//!
//! [`pool`]: crate::pool
//! [`TaskSet`]: crate::task_set::TaskSet
use crate::{
    loom::sync::{Arc, Mutex},
    task_set::TaskCounter,
};
use core::fmt;

/// A type-erased, single-invocation unit of work.
pub type Job = Box<dyn FnOnce() + Send>;

/// The capability to execute one-shot [`Job`]s.
///
/// Implementations must invoke every submitted job exactly once (dropping a
/// job unrun is permitted only when the scheduler itself is being torn
/// down). [`submit`] leaves the execution strategy to the scheduler, which
/// may run the job synchronously on the submitting thread; [`submit_queued`]
/// is a hint that the job must *not* be run inline, and defaults to plain
/// submission for schedulers with no inline path.
///
/// [`submit`]: Self::submit
/// [`submit_queued`]: Self::submit_queued
pub trait Schedule: Clone + Send + Sync + 'static {
    /// Submits a job for execution.
    fn submit(&self, job: Job);

    /// Submits a job that must be queued rather than run on the calling
    /// thread.
    fn submit_queued(&self, job: Job) {
        self.submit(job)
    }

    /// Returns the outstanding-work counter that futures scheduled through
    /// this scheduler attach to, if there is one.
    ///
    /// A future bumps the counter when it is constructed against this
    /// scheduler and decrements it after it becomes ready, so that waiting
    /// for the counter to drain implies every attached future is ready.
    fn counter(&self) -> Option<Arc<TaskCounter>> {
        None
    }
}

/// A [`Schedule`] implementation that invokes jobs synchronously on the
/// submitting thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct Immediate;

/// A [`Schedule`] implementation that does not run jobs at all: each
/// submission replaces the previously saved job, and the caller retrieves
/// the job with [`take`](Self::take) to run (or schedule) it later.
///
/// This is how [`when_all`](crate::when_all) constructs its aggregate
/// future with a producer but defers scheduling it until the last input
/// resolves.
#[derive(Clone)]
pub struct Intercept {
    saved: Arc<Mutex<Option<Job>>>,
}

// === impl Immediate ===

impl Schedule for Immediate {
    #[inline]
    fn submit(&self, job: Job) {
        job()
    }
}

// === impl Intercept ===

impl Intercept {
    /// Returns a new interceptor with no saved job.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the most recently submitted job, if any.
    #[must_use]
    pub fn take(&self) -> Option<Job> {
        self.saved
            .lock()
            .expect("interceptor lock is never poisoned")
            .take()
    }
}

impl Default for Intercept {
    fn default() -> Self {
        Self {
            saved: Arc::new(Mutex::new(None)),
        }
    }
}

impl Schedule for Intercept {
    fn submit(&self, job: Job) {
        *self
            .saved
            .lock()
            .expect("interceptor lock is never poisoned") = Some(job);
    }
}

impl fmt::Debug for Intercept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercept").finish_non_exhaustive()
    }
}
