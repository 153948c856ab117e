//! A modest background thread pool for running future producers.
//!
//! This is deliberately not a work-stealing scheduler: a single shared
//! queue and a fixed set of workers is enough to exercise and ship the
//! future primitives. The one scheduling refinement it has is the
//! inline-run optimization: a plain [`submit`] from a pool worker runs the
//! job on the spot rather than round-tripping it through the queue, and
//! [`submit_queued`] (the [`Launch::ASYNC`] path) opts out of that.
//!
//! [`submit`]: ThreadPool::submit
//! [`submit_queued`]: ThreadPool::submit_queued
//! [`Launch::ASYNC`]: crate::Launch::ASYNC
use crate::schedule::{Job, Schedule};
use core::fmt;
use std::{
    cell::Cell,
    sync::{mpsc, Arc, Mutex, OnceLock},
    thread,
};

/// A fixed-size pool of worker threads executing one-shot [`Job`]s.
///
/// Handles are cheap to clone and share the same workers. Workers drain
/// the queue and exit once every handle is gone; they are detached, so
/// dropping the last handle does not block on in-flight jobs.
#[derive(Clone)]
pub struct ThreadPool {
    jobs: mpsc::Sender<Job>,
}

thread_local! {
    /// Whether the current thread is a pool worker.
    static IS_WORKER: Cell<bool> = const { Cell::new(false) };
}

// === impl ThreadPool ===

impl ThreadPool {
    /// Spawns a pool of `workers` threads.
    ///
    /// # Panics
    ///
    /// If `workers` is zero, or if the OS refuses to spawn a thread.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "a thread pool needs at least one worker");
        let (jobs, queue) = mpsc::channel::<Job>();
        let queue = Arc::new(Mutex::new(queue));
        for n in 0..workers {
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("enoki-worker-{n}"))
                .spawn(move || Self::work(&queue))
                .expect("failed to spawn a pool worker thread");
        }
        Self { jobs }
    }

    /// Returns the lazily-initialized process-wide pool, sized to the
    /// available parallelism.
    pub fn global() -> &'static ThreadPool {
        static GLOBAL: OnceLock<ThreadPool> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let workers = thread::available_parallelism().map(usize::from).unwrap_or(4);
            ThreadPool::new(workers)
        })
    }

    fn work(queue: &Mutex<mpsc::Receiver<Job>>) {
        IS_WORKER.with(|is_worker| is_worker.set(true));
        trace!("pool worker started");
        loop {
            // hold the queue lock only while dequeueing, never while
            // running the job.
            let job = {
                let queue = queue.lock().expect("pool queue lock is never poisoned");
                queue.recv()
            };
            match job {
                Ok(job) => job(),
                // every sender is gone; no more work can arrive.
                Err(mpsc::RecvError) => break,
            }
        }
        trace!("pool worker exiting");
    }
}

impl Schedule for ThreadPool {
    fn submit(&self, job: Job) {
        if IS_WORKER.with(Cell::get) {
            test_trace!("ThreadPool::submit: running inline on a worker");
            job();
            return;
        }
        self.submit_queued(job);
    }

    fn submit_queued(&self, job: Job) {
        self.jobs
            .send(job)
            .expect("pool workers outlive every handle that could submit to them");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool").finish_non_exhaustive()
    }
}
