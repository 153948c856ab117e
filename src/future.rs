//! One-shot futures: refcounted handles to values produced exactly once.
//!
//! A [`Future`] is created by [`spawn`]ing a producer onto a
//! [`Schedule`] implementation (or by [`make_ready_future`], which skips
//! the producer entirely). Waiters observe the producer's completion
//! through [`Future::wait`] and friends; downstream work is chained with
//! [`Future::then`]; fan-in over many futures is built with
//! [`when_all`].
use crate::{
    loom::sync::Arc,
    schedule::{Job, Schedule},
    task_set::TaskCounter,
};
use std::{fmt, ops};
#[cfg(not(loom))]
use std::time::{Duration, Instant};

mod chain;
mod core;
mod when_all;


pub use self::when_all::{when_all, WhenAll};

use self::core::Core;

/// A refcounted handle to a value produced exactly once.
///
/// Handles are cheap to [`Clone`]; every clone refers to the same shared
/// state, and the state is released when the last handle *and* the
/// scheduled run of the producer are gone. Dropping every handle does not
/// cancel the producer: a scheduled run keeps the state alive until it
/// finishes.
pub struct Future<R> {
    core: Arc<Core<R>>,
}

/// The launch policy bits accepted by [`spawn`] and [`Future::then`].
///
/// `ASYNC` and `DEFERRED` may be combined with `|`. With neither bit set
/// ([`Launch::NONE`]), the scheduler is free to run the producer wherever
/// it likes, and waiters never run it inline.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Launch(u8);

/// The outcome of a timed wait.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitStatus {
    /// The future became ready within the timeout.
    Ready,
    /// The timeout elapsed first. The producer is not cancelled, and may
    /// still complete later.
    Timeout,
}

/// Schedules `producer` and returns a [`Future`] resolving to its result.
///
/// The producer is submitted to `scheduler` immediately; if
/// [`Launch::ASYNC`] is set it is submitted with the force-queue hint, so
/// the scheduler may not run it on this thread. If [`Launch::DEFERRED`] is
/// set, a waiter that finds the producer not yet started is allowed to run
/// it inline instead of blocking.
///
/// If the scheduler exposes a task-group counter (see
/// [`Schedule::counter`]), the future is attached to it: the counter is
/// bumped before the producer is submitted and decremented after the
/// future becomes ready.
pub fn spawn<R, F, S>(producer: F, scheduler: &S, launch: Launch) -> Future<R>
where
    R: Send + Sync + 'static,
    F: FnOnce() -> R + Send + 'static,
    S: Schedule,
{
    Future::new(Box::new(producer), scheduler, launch)
}

/// Returns a [`Future`] that is already resolved to `value`.
///
/// `is_ready` is immediately true and `get` never blocks. This is the
/// value, reference (`make_ready_future(&x)`), and unit
/// (`make_ready_future(())`) constructor all in one; for reference
/// futures, the usual borrow rules keep the target alive for as long as
/// the future is.
pub fn make_ready_future<R>(value: R) -> Future<R> {
    Future {
        core: Arc::new(Core::new_ready(value)),
    }
}

// === impl Future ===

impl<R> Future<R> {
    /// Returns `true` if the future has resolved.
    ///
    /// Once this returns `true` it always will, and a subsequent [`get`]
    /// returns without blocking.
    ///
    /// [`get`]: Self::get
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.core.ready()
    }

    /// Blocks the calling thread until the future is ready.
    ///
    /// If the future was spawned with [`Launch::DEFERRED`] and no one has
    /// started its producer, the producer runs here, on this thread,
    /// instead.
    pub fn wait(&self) {
        self.core.wait();
    }

    /// Waits for the future to be ready, giving up after `timeout`.
    ///
    /// A timeout does not cancel the producer; the wait may be retried and
    /// the future may still become ready asynchronously.
    #[cfg(not(loom))]
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.core.wait_for(timeout)
    }

    /// Waits for the future to be ready, giving up at `deadline`.
    ///
    /// A timeout does not cancel the producer; the wait may be retried and
    /// the future may still become ready asynchronously.
    #[cfg(not(loom))]
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        self.core.wait_until(deadline)
    }

    /// Waits for the future to resolve, then returns a reference to its
    /// value.
    ///
    /// Every handle sees the same value; call `get` as many times as you
    /// like.
    ///
    /// # Panics
    ///
    /// If the producer panicked, the panic is propagated to every `get`.
    pub fn get(&self) -> &R {
        self.core.wait();
        self.core.value()
    }
}

impl<R: Send + Sync + 'static> Future<R> {
    pub(crate) fn new<S: Schedule>(
        producer: Box<dyn FnOnce() -> R + Send>,
        scheduler: &S,
        launch: Launch,
    ) -> Self {
        let group = attach_group(scheduler);
        let this = Self {
            core: Arc::new(Core::new(
                producer,
                launch.contains(Launch::DEFERRED),
                group,
            )),
        };
        trace!(future = ?this, ?launch, "Future::new");
        submit_run(&this.core, scheduler, launch);
        this
    }

    /// Chains `f` to run once this future resolves, returning a future for
    /// its result.
    ///
    /// `f` receives a handle to this (by then resolved) future; it is free
    /// to inspect the value with [`get`], including a propagated producer
    /// panic. The continuation's own producer is submitted to `scheduler`
    /// when this future becomes ready (or right now, if it already is),
    /// under the same launch policy rules as [`spawn`].
    ///
    /// [`get`]: Self::get
    pub fn then<R2, F, S>(&self, f: F, scheduler: &S, launch: Launch) -> Future<R2>
    where
        R2: Send + Sync + 'static,
        F: FnOnce(Future<R>) -> R2 + Send + 'static,
        S: Schedule,
    {
        let upstream = self.clone();
        let producer = Box::new(move || {
            upstream.wait();
            f(upstream)
        });

        let downstream = Future {
            core: Arc::new(Core::new(
                producer,
                launch.contains(Launch::DEFERRED),
                attach_group(scheduler),
            )),
        };

        let run = downstream.core.clone();
        let scheduler = scheduler.clone();
        self.core.enqueue_or_run(move || {
            submit_run(&run, &scheduler, launch);
        });

        downstream
    }
}

/// Bumps the scheduler's task-group counter, if it has one, and returns it
/// for the core to decrement on completion.
fn attach_group<S: Schedule>(scheduler: &S) -> Option<Arc<TaskCounter>> {
    let counter = scheduler.counter();
    if let Some(counter) = &counter {
        counter.add();
    }
    counter
}

/// Submits the run of `core` to `scheduler`, honoring the force-queue bit.
fn submit_run<R, S>(core: &Arc<Core<R>>, scheduler: &S, launch: Launch)
where
    R: Send + Sync + 'static,
    S: Schedule,
{
    let run = core.clone();
    let job: Job = Box::new(move || {
        let _ = run.try_run();
    });
    if launch.contains(Launch::ASYNC) {
        scheduler.submit_queued(job);
    } else {
        scheduler.submit(job);
    }
}

impl<R> Clone for Future<R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<R> fmt::Debug for Future<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future").field("core", &self.core).finish()
    }
}

// === impl Launch ===

impl Launch {
    /// Neither policy bit: scheduler-default submission, no inline runs by
    /// waiters.
    pub const NONE: Self = Self(0);

    /// The producer must be queued by the scheduler, never run on the
    /// submitting thread.
    pub const ASYNC: Self = Self(1 << 0);

    /// A waiter may run the producer on its own thread if no one else has
    /// started it.
    pub const DEFERRED: Self = Self(1 << 1);

    /// Returns `true` if every bit in `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for Launch {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Launch {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("Launch::NONE");
        }
        let mut has_states = false;
        fmt_bits!(self, f, has_states, ASYNC, DEFERRED);
        Ok(())
    }
}
