//! Worker thread implementation

use crate::core::error::panic_message;
use crate::core::{BoxedJob, Result, ThreadError};
use crate::queue::JobQueue;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of jobs processed
    pub jobs_processed: AtomicU64,
    /// Total number of jobs that failed
    pub jobs_failed: AtomicU64,
    /// Total number of jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Total time spent processing jobs (microseconds)
    pub total_processing_time_us: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Jobs that returned `Ok`
    pub jobs_processed: u64,
    /// Jobs that returned `Err`
    pub jobs_failed: u64,
    /// Jobs that panicked
    pub jobs_panicked: u64,
    /// Busy time in microseconds
    pub total_processing_time_us: u64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment jobs processed counter
    pub fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs failed counter
    pub fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs panicked counter
    pub fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Add processing time
    pub fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total jobs processed
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Get total jobs failed
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Get average processing time per job in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_processed() + self.get_jobs_failed() + self.get_jobs_panicked();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Fold another worker's counters into this one
    pub fn absorb(&self, other: &WorkerStats) {
        self.jobs_processed
            .fetch_add(other.get_jobs_processed(), Ordering::Relaxed);
        self.jobs_failed
            .fetch_add(other.get_jobs_failed(), Ordering::Relaxed);
        self.jobs_panicked
            .fetch_add(other.get_jobs_panicked(), Ordering::Relaxed);
        self.add_processing_time(other.total_processing_time_us.load(Ordering::Relaxed));
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            jobs_processed: self.get_jobs_processed(),
            jobs_failed: self.get_jobs_failed(),
            jobs_panicked: self.get_jobs_panicked(),
            total_processing_time_us: self.total_processing_time_us.load(Ordering::Relaxed),
        }
    }
}

/// A worker thread that processes jobs from the shared queue
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a worker that serves `queue` until its run flag is cleared.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier unique within the pool generation
    /// * `name` - OS thread name
    /// * `stack_size` - Optional stack size for the thread
    /// * `queue` - Queue shared with the pool controller
    pub fn new(
        id: usize,
        name: String,
        stack_size: Option<usize>,
        queue: Arc<JobQueue>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let mut builder = thread::Builder::new().name(name);
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let thread = builder
            .spawn(move || {
                Self::run(id, &queue, &stats_clone);
            })
            .map_err(|e| ThreadError::spawn_with_source(id, "Cannot create worker thread", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| ThreadError::join(self.id, "Worker panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop. Blocks on the queue between jobs.
    fn run(id: usize, queue: &JobQueue, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        log::debug!("worker {} started", id);

        while let Some(mut job) = queue.pop() {
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_busy(id);

            Self::execute_job(id, &mut job, stats);
            // Drop the job (and anything it captured) before it stops counting as running.
            drop(job);
            queue.complete();

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_idle(id);
        }

        log::debug!(
            "worker {} stopping: {} processed, {} failed, {} panicked",
            id,
            stats.get_jobs_processed(),
            stats.get_jobs_failed(),
            stats.get_jobs_panicked()
        );
    }

    /// Execute a single job with panic protection
    fn execute_job(id: usize, job: &mut BoxedJob, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let job_span = span!(Level::DEBUG, "job_execution", job_type = job.job_type());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let start = Instant::now();
        let panic_result = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match panic_result {
            Ok(Ok(())) => {
                stats.increment_processed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, true);
            }
            Ok(Err(e)) => {
                log::warn!("worker {}: {} failed: {}", id, job.job_type(), e);
                stats.increment_failed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, false);
            }
            Err(panic_info) => {
                log::error!(
                    "worker {}: {} panicked: {}",
                    id,
                    job.job_type(),
                    panic_message(panic_info.as_ref())
                );
                stats.increment_panicked();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_panic(elapsed);
            }
        }

        stats.add_processing_time(elapsed.as_micros() as u64);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                if thread.join().is_err() {
                    log::error!("worker {} panicked outside of a job", self.id);
                }
            } else {
                log::warn!("worker {} dropped while still running; detaching", self.id);
            }
        }
    }
}
