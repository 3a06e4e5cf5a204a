//! Thread pool implementation

use crate::core::error::panic_message;
use crate::core::handle::{self, Promise};
use crate::core::{BoxedJob, ClosureJob, Job, JobHandle, Result, ThreadError, Waitable};
use crate::pool::worker::{Worker, WorkerStatSnapshot, WorkerStats};
use crate::queue::JobQueue;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for thread pool
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Thread name prefix; workers are named `{prefix}-{id}`
    pub thread_name_prefix: String,
    /// Start the pool on demand when a job is submitted while it is stopped.
    /// Default: false
    pub auto_restart: bool,
    /// Stack size for worker threads (None = platform default)
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: "worker".to_string(),
            auto_restart: false,
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    /// Create a new configuration with specified number of threads (0 = number of CPUs)
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: resolve_thread_count(num_threads),
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Let submissions restart a stopped pool instead of failing with
    /// [`ThreadError::PoolClosed`]. `resume()` on a stopped pool starts it too.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_auto_restart(mut self, enabled: bool) -> Self {
        self.auto_restart = enabled;
        self
    }

    /// Set the worker stack size in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(ThreadError::invalid_config(
                "num_threads",
                "Number of threads must be greater than 0",
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(ThreadError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        if self.stack_size == Some(0) {
            return Err(ThreadError::invalid_config(
                "stack_size",
                "Stack size must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn resolve_thread_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Lifecycle state of a [`ThreadPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolState {
    /// No workers; submissions fail with `PoolClosed`
    Stopped,
    /// Workers are dequeuing and executing jobs
    Running,
    /// Workers are alive but do not dequeue
    Paused,
}

/// Serializable snapshot of pool-wide statistics
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Lifecycle state at the time of the snapshot
    pub state: PoolState,
    /// Live worker threads
    pub threads: usize,
    /// Jobs waiting in the queue
    pub queued_jobs: usize,
    /// Jobs currently executing
    pub running_jobs: usize,
    /// Jobs accepted since the pool was created
    pub jobs_submitted: u64,
    /// Execution counters across every worker the pool ever had
    pub totals: WorkerStatSnapshot,
    /// When the current worker set was started
    pub started_at: Option<DateTime<Utc>>,
}

/// Wrap `body` so that its outcome is delivered through `promise`.
///
/// The wrapper still reports failures to the worker, so they show up in the
/// worker statistics and logs: errors are returned, panics are re-raised after
/// the promise has been fulfilled.
pub(crate) fn bridged<T, F>(promise: Promise<T>, body: F) -> impl FnOnce() -> Result<()> + Send
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    move || {
        let job_id = promise.job_id();
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => {
                promise.fulfil(Ok(value));
                Ok(())
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                promise.fulfil(Err(ThreadError::execution(job_id, message.clone())));
                Err(ThreadError::execution(job_id, message))
            }
            Err(payload) => {
                let message = format!("job panicked: {}", panic_message(payload.as_ref()));
                promise.fulfil(Err(ThreadError::execution(job_id, message)));
                resume_unwind(payload)
            }
        }
    }
}

/// A pool of worker threads sharing one FIFO job queue.
///
/// # Lifecycle
///
/// `Stopped` → [`start`](Self::start) → `Running` ⇄ [`pause`](Self::pause) /
/// [`resume`](Self::resume) → `Paused` → [`shutdown`](Self::shutdown) → `Stopped`.
/// The worker set can be rebuilt at any time with
/// [`set_thread_count`](Self::set_thread_count) or [`reset`](Self::reset).
///
/// # Blocking calls
///
/// `pause`, `finish_all_jobs`, `shutdown`, `set_thread_count`, `reset` and the
/// `for_each*` helpers block the caller. Calling them from inside a job of the
/// same pool can deadlock.
pub struct ThreadPool {
    config: ThreadPoolConfig,
    queue: Arc<JobQueue>,
    /// Live workers. The lock also serializes lifecycle transitions and is
    /// held while waiting on running jobs.
    workers: Mutex<Vec<Worker>>,
    /// Stats of live workers. Never held across a wait, so jobs can read it.
    live_stats: Mutex<Vec<Arc<WorkerStats>>>,
    running: AtomicBool,
    target_threads: AtomicUsize,
    live_threads: AtomicUsize,
    /// Totals of joined workers; only updated under `live_stats`.
    retired: WorkerStats,
    total_jobs_submitted: AtomicU64,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("threads", &self.thread_count())
            .field("queue", &self.queue)
            .field(
                "total_jobs_submitted",
                &self.total_jobs_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl ThreadPool {
    /// Create a new thread pool with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ThreadPoolConfig::default())
    }

    /// Create a thread pool with specified number of threads (0 = number of CPUs)
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(ThreadPoolConfig::new(num_threads))
    }

    /// Create a thread pool with custom configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            target_threads: AtomicUsize::new(config.num_threads),
            config,
            queue: Arc::new(JobQueue::new()),
            workers: Mutex::new(Vec::new()),
            live_stats: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            live_threads: AtomicUsize::new(0),
            retired: WorkerStats::new(),
            total_jobs_submitted: AtomicU64::new(0),
            started_at: Mutex::new(None),
        })
    }

    /// Start the pool with the current target thread count.
    ///
    /// The target is the configured `num_threads` until changed by
    /// [`set_thread_count`](Self::set_thread_count) or [`reset`](Self::reset).
    /// Does nothing if the pool is already running.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        let count = self.target_threads.load(Ordering::Relaxed);
        self.start_locked(&mut workers, count)
    }

    /// Start the pool with `num_threads` workers (0 = number of CPUs).
    ///
    /// Does nothing if the pool is already running.
    pub fn start_with_threads(&self, num_threads: usize) -> Result<()> {
        let mut workers = self.workers.lock();
        self.start_locked(&mut workers, resolve_thread_count(num_threads))
    }

    fn start_locked(&self, workers: &mut Vec<Worker>, count: usize) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        self.target_threads.store(count, Ordering::Relaxed);
        self.queue.set_paused(false);
        self.spawn_workers(workers, count)?;
        self.queue.set_accepting(true);
        *self.started_at.lock() = Some(Utc::now());
        self.running.store(true, Ordering::Release);

        log::debug!(
            "pool '{}' started with {} workers",
            self.config.thread_name_prefix,
            count
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(count);

        Ok(())
    }

    fn spawn_workers(&self, workers: &mut Vec<Worker>, count: usize) -> Result<()> {
        self.queue.release_workers();
        workers.reserve(count);

        for id in 0..count {
            let name = format!("{}-{}", self.config.thread_name_prefix, id);
            match Worker::new(id, name, self.config.stack_size, Arc::clone(&self.queue)) {
                Ok(worker) => {
                    self.live_stats.lock().push(worker.stats());
                    workers.push(worker);
                }
                Err(e) => {
                    log::error!("failed to spawn worker {}: {}", id, e);
                    // Best effort: the spawn error is the one worth reporting.
                    let _ = self.stop_workers(workers);
                    return Err(e);
                }
            }
        }

        self.live_threads.store(workers.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Clear the run flag and join every worker, keeping their statistics.
    fn stop_workers(&self, workers: &mut Vec<Worker>) -> Result<()> {
        self.queue.halt_workers();

        let mut first_error = None;
        for worker in workers.drain(..) {
            if let Err(e) = worker.join() {
                first_error.get_or_insert(e);
            }
        }

        let mut live_stats = self.live_stats.lock();
        for stats in live_stats.drain(..) {
            self.retired.absorb(&stats);
        }
        drop(live_stats);
        self.live_threads.store(0, Ordering::Relaxed);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Put the pool in the stopped state after the worker set could not be rebuilt.
    fn fail_stopped(&self) {
        self.queue.set_accepting(false);
        self.running.store(false, Ordering::Release);
        self.queue.set_paused(false);
        *self.started_at.lock() = None;

        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            log::error!(
                "pool '{}' stopped without workers; abandoning {} queued jobs",
                self.config.thread_name_prefix,
                abandoned.len()
            );
        }
    }

    /// Stop dequeuing and block until every running job has finished.
    ///
    /// Queued jobs stay queued. Does nothing if the pool is stopped.
    pub fn pause(&self) {
        let _workers = self.workers.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        self.queue.set_paused(true);
        self.queue.wait_no_running();

        log::debug!("pool '{}' paused", self.config.thread_name_prefix);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pause(true, self.queue.queued_len());
    }

    /// Let workers dequeue again.
    ///
    /// On a stopped pool this starts it when `auto_restart` is configured and
    /// does nothing otherwise.
    pub fn resume(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if !self.running.load(Ordering::Acquire) {
            if self.config.auto_restart {
                let count = self.target_threads.load(Ordering::Relaxed);
                return self.start_locked(&mut workers, count);
            }
            return Ok(());
        }

        self.queue.set_paused(false);

        log::debug!("pool '{}' resumed", self.config.thread_name_prefix);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pause(false, self.queue.queued_len());

        Ok(())
    }

    /// Block until no job is queued and none is running.
    ///
    /// Workers keep running. On a paused pool with queued jobs this waits
    /// until another thread resumes it.
    pub fn finish_all_jobs(&self) {
        self.queue.wait_quiescent();
    }

    /// Drain every queued job, then stop and join all workers.
    ///
    /// A paused pool is resumed first so the queue can drain. Jobs submitted
    /// by running jobs are still accepted until the pool is quiescent.
    /// Calling this on a stopped pool does nothing.
    pub fn shutdown(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if !self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        self.queue.set_paused(false);
        self.queue.close_when_quiescent();
        self.running.store(false, Ordering::Release);
        *self.started_at.lock() = None;

        let result = self.stop_workers(&mut workers);

        log::debug!(
            "pool '{}' shut down: {} processed, {} failed, {} panicked",
            self.config.thread_name_prefix,
            self.retired.get_jobs_processed(),
            self.retired.get_jobs_failed(),
            self.retired.get_jobs_panicked()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(
            self.retired.get_jobs_processed(),
            self.retired.get_jobs_failed(),
            0,
        );

        result
    }

    /// Stop without draining: discard every queued job, wait for running jobs,
    /// join all workers.
    ///
    /// Handles of discarded jobs resolve to [`ThreadError::Abandoned`].
    /// Returns the number of discarded jobs.
    pub fn shutdown_now(&self) -> Result<usize> {
        let mut workers = self.workers.lock();
        if !self.running.load(Ordering::Acquire) {
            return Ok(0);
        }

        self.queue.set_accepting(false);
        self.running.store(false, Ordering::Release);
        *self.started_at.lock() = None;

        let discarded = self.queue.drain();
        let count = discarded.len();
        // Dropping the jobs releases their promises.
        drop(discarded);

        let result = self.stop_workers(&mut workers);
        self.queue.set_paused(false);

        if count > 0 {
            log::warn!(
                "pool '{}' shut down immediately; {} queued jobs discarded",
                self.config.thread_name_prefix,
                count
            );
        }
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(
            self.retired.get_jobs_processed(),
            self.retired.get_jobs_failed(),
            count,
        );

        result.map(|()| count)
    }

    /// Graceful [`shutdown`](Self::shutdown) followed by a start with
    /// `num_threads` workers (0 = number of CPUs).
    pub fn reset(&self, num_threads: usize) -> Result<()> {
        self.shutdown()?;
        self.start_with_threads(num_threads)
    }

    /// Rebuild the worker set with `num_threads` workers.
    ///
    /// `0` is equivalent to [`shutdown`](Self::shutdown). Otherwise the pool is
    /// paused, running jobs are allowed to finish, the old workers are joined
    /// and new ones spawned. Queued jobs are preserved and the previous pause
    /// state is restored. A stopped pool is started with the new count.
    pub fn set_thread_count(&self, num_threads: usize) -> Result<()> {
        if num_threads == 0 {
            return self.shutdown();
        }

        let mut workers = self.workers.lock();
        if !self.running.load(Ordering::Acquire) {
            return self.start_locked(&mut workers, num_threads);
        }

        let previous = workers.len();
        let was_paused = self.queue.is_paused();
        self.queue.set_paused(true);
        self.queue.wait_no_running();

        let rebuilt = self
            .stop_workers(&mut workers)
            .and_then(|()| self.spawn_workers(&mut workers, num_threads));
        if let Err(e) = rebuilt {
            self.fail_stopped();
            return Err(e);
        }

        self.target_threads.store(num_threads, Ordering::Relaxed);
        self.queue.set_paused(was_paused);

        log::debug!(
            "pool '{}' resized from {} to {} workers",
            self.config.thread_name_prefix,
            previous,
            num_threads
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_resize(previous, num_threads);

        Ok(())
    }

    fn enqueue(&self, job: BoxedJob) -> Result<()> {
        let job = match self.queue.push(job) {
            Ok(()) => {
                self.record_submission();
                return Ok(());
            }
            Err(rejected) => rejected.into_job(),
        };

        if !self.config.auto_restart {
            return Err(ThreadError::pool_closed(&self.config.thread_name_prefix));
        }

        log::debug!(
            "pool '{}' restarting on submission",
            self.config.thread_name_prefix
        );
        self.start()?;
        self.queue
            .push(job)
            .map_err(|_| ThreadError::pool_closed(&self.config.thread_name_prefix))?;
        self.record_submission();
        Ok(())
    }

    fn record_submission(&self) {
        self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_submission(self.queue.queued_len());
    }

    /// Submit a job to the pool. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// - `ThreadError::PoolClosed` - the pool is stopped and `auto_restart` is off
    pub fn submit<J: Job + 'static>(&self, job: J) -> Result<()> {
        self.enqueue(Box::new(job))
    }

    /// Submit a closure as a fire-and-forget job.
    ///
    /// Arguments are bound by capturing them in a `move` closure. An error
    /// returned by the closure, or a panic, is logged and counted in the
    /// worker statistics.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(ClosureJob::new(f))
    }

    /// Submit a closure and get a handle that reports its completion.
    ///
    /// An error returned by the closure, or a panic, is delivered through the
    /// handle as [`ThreadError::ExecutionError`].
    ///
    /// # Example
    ///
    /// ```
    /// use job_pool::prelude::*;
    /// use std::time::Duration;
    ///
    /// # fn main() -> Result<()> {
    /// let pool = ThreadPool::with_threads(2)?;
    /// pool.start()?;
    ///
    /// let mut done = pool.submit_waitable(|| {
    ///     std::thread::sleep(Duration::from_millis(10));
    ///     Ok(())
    /// })?;
    /// assert_eq!(done.wait_for(Duration::from_secs(5)), WaitStatus::Ready);
    /// # pool.shutdown()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn submit_waitable<F>(&self, f: F) -> Result<Waitable>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.try_submit_for_return(f)
    }

    /// Submit a closure and get a handle to the value it returns.
    ///
    /// A panic inside the closure is delivered through the handle as
    /// [`ThreadError::ExecutionError`]; the worker keeps running.
    pub fn submit_for_return<T, F>(&self, f: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.try_submit_for_return(move || Ok(f()))
    }

    /// Like [`submit_for_return`](Self::submit_for_return) for closures that
    /// can fail. An `Err` is delivered through the handle.
    pub fn try_submit_for_return<T, F>(&self, f: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (promise, handle) = handle::promise();
        let job = ClosureJob::with_name(bridged(promise, f), "WaitableJob");
        self.submit(job)?;
        Ok(handle)
    }

    /// Target number of worker threads
    pub fn num_threads(&self) -> usize {
        self.target_threads.load(Ordering::Relaxed)
    }

    /// Number of live worker threads (0 when stopped)
    pub fn thread_count(&self) -> usize {
        self.live_threads.load(Ordering::Relaxed)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        if !self.running.load(Ordering::Acquire) {
            PoolState::Stopped
        } else if self.queue.is_paused() {
            PoolState::Paused
        } else {
            PoolState::Running
        }
    }

    /// Check if the pool has live workers
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if dequeuing is paused
    pub fn is_paused(&self) -> bool {
        self.state() == PoolState::Paused
    }

    /// True iff nothing is queued and nothing is running
    pub fn is_quiescent(&self) -> bool {
        self.queue.is_quiescent()
    }

    /// Approximate number of jobs waiting to be dequeued
    pub fn queued_jobs(&self) -> usize {
        self.queue.queued_len()
    }

    /// Approximate number of jobs currently executing
    pub fn running_jobs(&self) -> usize {
        self.queue.running_len()
    }

    /// Get total number of jobs submitted
    pub fn total_jobs_submitted(&self) -> u64 {
        self.total_jobs_submitted.load(Ordering::Relaxed)
    }

    /// Get statistics for all live workers.
    ///
    /// Safe to call from inside a job, even while a lifecycle call waits on it.
    pub fn get_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.live_stats.lock().clone()
    }

    fn totals(&self) -> WorkerStatSnapshot {
        let totals = WorkerStats::new();
        let live_stats = self.live_stats.lock();
        totals.absorb(&self.retired);
        for stats in live_stats.iter() {
            totals.absorb(stats);
        }
        totals.snapshot()
    }

    /// Get total jobs processed, including workers that have since been replaced
    pub fn total_jobs_processed(&self) -> u64 {
        self.totals().jobs_processed
    }

    /// Get total jobs failed, including workers that have since been replaced
    pub fn total_jobs_failed(&self) -> u64 {
        self.totals().jobs_failed
    }

    /// Get total jobs panicked, including workers that have since been replaced
    pub fn total_jobs_panicked(&self) -> u64 {
        self.totals().jobs_panicked
    }

    /// Snapshot of pool-wide statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state(),
            threads: self.thread_count(),
            queued_jobs: self.queued_jobs(),
            running_jobs: self.running_jobs(),
            jobs_submitted: self.total_jobs_submitted(),
            totals: self.totals(),
            started_at: *self.started_at.lock(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown() {
                log::error!(
                    "failed to shut down pool '{}' during drop: {}",
                    self.config.thread_name_prefix,
                    e
                );
            }
        }
    }
}
