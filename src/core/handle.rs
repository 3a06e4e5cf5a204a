//! Result bridge between a submitted job and the caller waiting on it.
//!
//! Every waitable submission creates a single-slot channel. The sending half
//! ([`Promise`]) moves into the job wrapper and is consumed exactly once: by
//! [`Promise::fulfil`] after the job body finished, or by being dropped when
//! the job is discarded without running. The receiving half lives in the
//! caller's [`JobHandle`].
//!
//! # Example
//!
//! ```rust
//! use job_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::with_threads(2)?;
//! pool.start()?;
//!
//! let mut handle = pool.submit_for_return(|| 125 * 125)?;
//! assert_eq!(handle.wait_for(Duration::from_secs(5)), WaitStatus::Ready);
//! assert_eq!(handle.get()?, 15625);
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```

use crate::core::{Result, ThreadError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Generates a unique job ID
pub(crate) fn next_job_id() -> u64 {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outcome of a bounded wait on a [`JobHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The job finished (successfully or not) or was abandoned
    Ready,
    /// The wait expired first; the job may still complete later
    Timeout,
}

/// Write-once sending half owned by the job wrapper
pub(crate) struct Promise<T> {
    job_id: u64,
    sender: Sender<Result<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Deliver the job's outcome. Consumes the promise.
    pub(crate) fn fulfil(self, outcome: Result<T>) {
        // The caller may have dropped its handle already.
        let _ = self.sender.send(outcome);
    }
}

/// Create a connected promise/handle pair with a fresh job id
pub(crate) fn promise<T>() -> (Promise<T>, JobHandle<T>) {
    let job_id = next_job_id();
    let (sender, receiver) = bounded(1);
    (
        Promise { job_id, sender },
        JobHandle {
            job_id,
            receiver,
            outcome: None,
        },
    )
}

/// Waitable handle to the outcome of a submitted job.
///
/// The handle can be waited on any number of times; the value is taken out
/// once with [`get`](Self::get).
pub struct JobHandle<T> {
    job_id: u64,
    receiver: Receiver<Result<T>>,
    outcome: Option<Result<T>>,
}

/// Handle for jobs that produce no value, only a completion signal
pub type Waitable = JobHandle<()>;

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("ready", &self.outcome.is_some())
            .finish()
    }
}

impl<T> JobHandle<T> {
    /// ID of the job this handle belongs to
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Block until the job has finished or has been abandoned
    pub fn wait(&mut self) {
        if self.outcome.is_none() {
            let outcome = self
                .receiver
                .recv()
                .unwrap_or_else(|_| Err(ThreadError::abandoned(self.job_id)));
            self.outcome = Some(outcome);
        }
    }

    /// Block for at most `timeout` waiting for the job to finish
    pub fn wait_for(&mut self, timeout: Duration) -> WaitStatus {
        if self.outcome.is_some() {
            return WaitStatus::Ready;
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                WaitStatus::Ready
            }
            Err(RecvTimeoutError::Timeout) => WaitStatus::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                self.outcome = Some(Err(ThreadError::abandoned(self.job_id)));
                WaitStatus::Ready
            }
        }
    }

    /// Check without blocking whether the outcome is available
    pub fn is_ready(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }

        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.outcome = Some(Err(ThreadError::abandoned(self.job_id)));
                true
            }
        }
    }

    /// Take the job's outcome, blocking until it is available
    ///
    /// # Errors
    ///
    /// - `ThreadError::ExecutionError` - the job returned an error or panicked
    /// - `ThreadError::Abandoned` - the job was discarded before running
    pub fn get(mut self) -> Result<T> {
        self.wait();
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => Err(ThreadError::abandoned(self.job_id)),
        }
    }
}
