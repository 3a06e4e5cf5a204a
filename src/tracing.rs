//! Tracing integration for observability.
//!
//! Always-on lifecycle logging goes through the `log` facade. With the
//! `tracing` feature enabled the pool additionally opens worker/job spans and
//! emits the metric events in [`metrics`].
//!
//! ```rust,ignore
//! use job_pool::prelude::*;
//! use job_pool::tracing::TracedJob;
//!
//! let pool = ThreadPool::with_threads(4)?;
//! pool.start()?;
//!
//! // The submitting span is re-entered on the worker
//! pool.submit(TracedJob::new(ClosureJob::new(|| Ok(()))))?;
//! ```

use crate::core::{Job, Result};

/// A job wrapper that carries the submitter's tracing span to the worker.
///
/// Without the `tracing` feature this is a transparent wrapper.
pub struct TracedJob<J: Job> {
    inner: J,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<J: Job> TracedJob<J> {
    /// Wrap `job`, capturing the current span
    pub fn new(job: J) -> Self {
        Self {
            inner: job,
            #[cfg(feature = "tracing")]
            span: tracing::Span::current(),
        }
    }

    /// Wrap `job` with an explicit span
    #[cfg(feature = "tracing")]
    pub fn with_span(job: J, span: tracing::Span) -> Self {
        Self { inner: job, span }
    }
}

impl<J: Job> Job for TracedJob<J> {
    fn execute(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn job_type(&self) -> &str {
        self.inner.job_type()
    }
}

/// Metric events, consumable by any `tracing` subscriber.
#[cfg(feature = "tracing")]
pub mod metrics {
    use std::time::Duration;

    /// A job entered the queue.
    #[inline]
    pub fn record_submission(queue_depth: usize) {
        tracing::trace!(
            counter.jobs_submitted = 1,
            gauge.queue_depth = queue_depth as i64,
            "job submitted"
        );
    }

    /// A job returned, successfully or with an error.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_us = duration.as_micros() as u64;
        if success {
            tracing::trace!(
                counter.jobs_completed = 1,
                histogram.job_duration_us = duration_us,
                "job completed"
            );
        } else {
            tracing::trace!(
                counter.jobs_failed = 1,
                histogram.job_duration_us = duration_us,
                "job failed"
            );
        }
    }

    /// A job panicked.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.jobs_panicked = 1,
            histogram.job_duration_us = duration.as_micros() as u64,
            "job panicked"
        );
    }

    /// Worker picked up a job.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = 1, worker_id, "worker busy");
    }

    /// Worker finished a job.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = -1i64, worker_id, "worker idle");
    }

    /// Workers were spawned.
    #[inline]
    pub fn record_pool_start(num_workers: usize) {
        tracing::info!(workers = num_workers, "job pool started");
    }

    /// Pause flag changed.
    #[inline]
    pub fn record_pause(paused: bool, queue_depth: usize) {
        tracing::debug!(paused, queue_depth, "job pool pause state changed");
    }

    /// Worker set was rebuilt with a new size.
    #[inline]
    pub fn record_resize(from: usize, to: usize) {
        tracing::info!(from, to, "job pool resized");
    }

    /// Workers were joined.
    #[inline]
    pub fn record_pool_shutdown(jobs_processed: u64, jobs_failed: u64, jobs_discarded: usize) {
        tracing::info!(
            jobs_processed,
            jobs_failed,
            jobs_discarded,
            "job pool shutdown complete"
        );
    }
}
