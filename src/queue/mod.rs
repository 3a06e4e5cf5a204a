//! Shared FIFO job queue and the bookkeeping used to detect quiescence.
//!
//! One [`parking_lot::Mutex`] guards the pending jobs together with the pause,
//! run and accepting flags. Two condition variables hang off it:
//!
//! - `work_available` wakes workers when a job is pushed, when the pool is
//!   resumed, or when workers are told to stop.
//! - `idle` wakes controllers waiting for running jobs to finish
//!   (`pause`) or for the whole pool to drain (`finish_all_jobs`).
//!
//! The queued/running counters are only modified while the lock is held, so
//! [`JobQueue::is_quiescent`] observes them consistently. They are also
//! readable without the lock for approximate statistics.

use crate::core::BoxedJob;
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Errors returned by queue operations
#[derive(Debug)]
pub enum QueueError {
    /// Queue is not accepting jobs; the rejected job is handed back
    Closed(BoxedJob),
}

impl QueueError {
    /// Recover the job that could not be queued
    pub fn into_job(self) -> BoxedJob {
        match self {
            QueueError::Closed(job) => job,
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Closed(_) => write!(f, "queue is closed"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

struct QueueState {
    jobs: VecDeque<BoxedJob>,
    paused: bool,
    /// Run flag: workers leave their loop once this is cleared.
    workers_released: bool,
    accepting: bool,
}

/// Mutex-protected FIFO of pending jobs shared by all workers of a pool
pub struct JobQueue {
    state: Mutex<QueueState>,
    work_available: Condvar,
    idle: Condvar,
    queued: CachePadded<AtomicUsize>,
    running: CachePadded<AtomicUsize>,
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("queued", &self.queued_len())
            .field("running", &self.running_len())
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    /// Create an empty queue that rejects jobs until opened
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                paused: false,
                workers_released: false,
                accepting: false,
            }),
            work_available: Condvar::new(),
            idle: Condvar::new(),
            queued: CachePadded::new(AtomicUsize::new(0)),
            running: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Append a job at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] carrying the job when the queue is not
    /// accepting submissions.
    pub fn push(&self, job: BoxedJob) -> QueueResult<()> {
        let mut state = self.state.lock();
        if !state.accepting {
            return Err(QueueError::Closed(job));
        }

        state.jobs.push_back(job);
        self.queued.fetch_add(1, Ordering::Relaxed);
        drop(state);

        self.work_available.notify_one();
        Ok(())
    }

    /// Non-blocking form of [`pop`](Self::pop): pop the head job if one is
    /// available and the queue is not paused, without waiting.
    ///
    /// Useful for callers that drive a queue from their own loop; pool
    /// workers use the blocking `pop`.
    ///
    /// A returned job is counted as running until [`complete`](Self::complete)
    /// is called for it.
    pub fn try_pop(&self) -> Option<BoxedJob> {
        let mut state = self.state.lock();
        if state.paused {
            return None;
        }
        self.take_front(&mut state)
    }

    /// Block until a job can be handed to the calling worker.
    ///
    /// Returns `None` once the run flag has been cleared. Jobs still queued at
    /// that point stay queued.
    pub fn pop(&self) -> Option<BoxedJob> {
        let mut state = self.state.lock();
        loop {
            if !state.workers_released {
                return None;
            }
            if !state.paused {
                if let Some(job) = self.take_front(&mut state) {
                    return Some(job);
                }
            }
            self.work_available.wait(&mut state);
        }
    }

    fn take_front(&self, state: &mut QueueState) -> Option<BoxedJob> {
        let job = state.jobs.pop_front()?;
        self.running.fetch_add(1, Ordering::Relaxed);
        self.queued.fetch_sub(1, Ordering::Relaxed);
        Some(job)
    }

    /// Mark one previously popped job as finished
    pub fn complete(&self) {
        let state = self.state.lock();
        let previous = self.running.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "complete() without a running job");
        let now_idle = previous == 1;
        drop(state);

        if now_idle {
            self.idle.notify_all();
        }
    }

    /// True iff nothing is queued and nothing is running
    pub fn is_quiescent(&self) -> bool {
        let _state = self.state.lock();
        self.is_quiescent_locked()
    }

    fn is_quiescent_locked(&self) -> bool {
        self.queued.load(Ordering::Relaxed) == 0 && self.running.load(Ordering::Relaxed) == 0
    }

    /// Block until nothing is queued and nothing is running
    pub fn wait_quiescent(&self) {
        let mut state = self.state.lock();
        while !self.is_quiescent_locked() {
            self.idle.wait(&mut state);
        }
    }

    /// Block until quiescent, then stop accepting submissions.
    ///
    /// Both happen under one lock acquisition, so no job can slip in between.
    /// Running jobs may keep submitting until the queue drains.
    pub fn close_when_quiescent(&self) {
        let mut state = self.state.lock();
        while !self.is_quiescent_locked() {
            self.idle.wait(&mut state);
        }
        state.accepting = false;
    }

    /// Block until no popped job is still executing
    pub fn wait_no_running(&self) {
        let mut state = self.state.lock();
        while self.running.load(Ordering::Relaxed) != 0 {
            self.idle.wait(&mut state);
        }
    }

    /// Stop or restart handing jobs to workers
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.lock();
        state.paused = paused;
        drop(state);

        if !paused {
            self.work_available.notify_all();
        }
    }

    /// Whether dequeuing is currently paused
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Allow or reject new submissions
    pub fn set_accepting(&self, accepting: bool) {
        self.state.lock().accepting = accepting;
    }

    /// Whether [`push`](Self::push) currently succeeds
    pub fn is_accepting(&self) -> bool {
        self.state.lock().accepting
    }

    /// Set the run flag so newly spawned workers stay in their loop
    pub fn release_workers(&self) {
        self.state.lock().workers_released = true;
    }

    /// Clear the run flag and wake every worker so it can exit
    pub fn halt_workers(&self) {
        let mut state = self.state.lock();
        state.workers_released = false;
        drop(state);

        self.work_available.notify_all();
    }

    /// Remove every queued job without running it
    pub fn drain(&self) -> Vec<BoxedJob> {
        let mut state = self.state.lock();
        let jobs: Vec<BoxedJob> = state.jobs.drain(..).collect();
        self.queued.fetch_sub(jobs.len(), Ordering::Relaxed);
        drop(state);

        self.idle.notify_all();
        jobs
    }

    /// Approximate number of queued jobs
    pub fn queued_len(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Approximate number of jobs currently executing
    pub fn running_len(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }
}
