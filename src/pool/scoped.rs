//! Batch helpers that run a closure over borrowed data on the pool.
//!
//! [`ThreadPool::for_each`] and [`ThreadPool::for_each_indexed`] submit one
//! job per element and block until every one of them has finished, so the
//! jobs may borrow from the caller's stack.

use crate::core::handle::{self, Waitable};
use crate::core::{ClosureJob, Result, ThreadError};
use crate::pool::thread_pool::{bridged, ThreadPool};

type ScopedBody<'s> = Box<dyn FnOnce() -> Result<()> + Send + 's>;

/// Waits for every submitted job, even when the caller unwinds.
struct Scope {
    pending: Vec<Waitable>,
}

impl Scope {
    /// Wait for all jobs and return the first failure, in submission order
    fn join(mut self) -> Option<ThreadError> {
        let mut first_failure = None;
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.get() {
                first_failure.get_or_insert(e);
            }
        }
        first_failure
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        for mut handle in self.pending.drain(..) {
            handle.wait();
        }
    }
}

/// Erase the borrow lifetime of a job body.
///
/// # Safety
///
/// The caller must not let `'s` end before the returned box has been consumed
/// or dropped. [`Scope`] guarantees this by waiting on the job's handle, which
/// only resolves once the body has run or been discarded.
unsafe fn erase_lifetime<'s>(body: ScopedBody<'s>) -> ScopedBody<'static> {
    // SAFETY: both types are the same fat pointer; only the lifetime bound
    // differs, and the caller upholds it.
    std::mem::transmute::<ScopedBody<'s>, ScopedBody<'static>>(body)
}

impl ThreadPool {
    fn run_scoped<'s, I, B>(&self, bodies: I) -> Result<()>
    where
        I: Iterator<Item = B>,
        B: FnOnce() -> Result<()> + Send + 's,
    {
        let mut scope = Scope {
            pending: Vec::with_capacity(bodies.size_hint().0),
        };
        let mut submit_error = None;

        for body in bodies {
            let (promise, handle) = handle::promise::<()>();
            let scoped: ScopedBody<'s> = Box::new(bridged(promise, body));
            // SAFETY: `scope` waits on `handle` before this function returns or
            // unwinds. If the submission is rejected the job is dropped inside
            // `submit` and the handle resolves immediately.
            let job = unsafe { erase_lifetime(scoped) };
            match self.submit(ClosureJob::with_name(job, "ScopedJob")) {
                Ok(()) => scope.pending.push(handle),
                Err(e) => {
                    submit_error = Some(e);
                    break;
                }
            }
        }

        let first_failure = scope.join();
        match submit_error.or(first_failure) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `job` once for every element of `items` and wait for all of them.
    ///
    /// Elements are submitted in order. Every job runs even if an earlier one
    /// fails; the first failure in submission order is returned afterwards.
    /// A panicking job is reported as [`ThreadError::ExecutionError`].
    ///
    /// Must not be called from a job of the same pool: if every worker ends
    /// up waiting here, nothing is left to run the submitted jobs.
    ///
    /// # Example
    ///
    /// ```
    /// use job_pool::prelude::*;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// # fn main() -> Result<()> {
    /// let pool = ThreadPool::with_threads(4)?;
    /// pool.start()?;
    ///
    /// let primes = [2u64, 3, 5, 7, 11];
    /// let sum = AtomicU64::new(0);
    /// pool.for_each(&primes, |p| {
    ///     sum.fetch_add(*p, Ordering::Relaxed);
    ///     Ok(())
    /// })?;
    /// assert_eq!(sum.load(Ordering::Relaxed), 28);
    /// # pool.shutdown()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn for_each<T, F>(&self, items: &[T], job: F) -> Result<()>
    where
        T: Sync,
        F: Fn(&T) -> Result<()> + Sync,
    {
        let job = &job;
        self.run_scoped(items.iter().map(move |item| move || job(item)))
    }

    /// Run `job` for every index in `from..to` advancing by `step`, and wait
    /// for all of them.
    ///
    /// An empty range (`from >= to`) submits nothing.
    ///
    /// # Errors
    ///
    /// - `ThreadError::InvalidArgument` - `step` is zero
    /// - the first job failure, as for [`for_each`](Self::for_each)
    pub fn for_each_indexed<F>(&self, from: usize, to: usize, step: usize, job: F) -> Result<()>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        if step == 0 {
            return Err(ThreadError::invalid_argument(
                "step",
                "Step must be greater than 0",
            ));
        }

        let job = &job;
        self.run_scoped((from..to).step_by(step).map(move |index| move || job(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const PRIMES: [u64; 25] = [
        2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83,
        89, 97,
    ];

    fn started(threads: usize) -> ThreadPool {
        let pool = ThreadPool::with_threads(threads).expect("Failed to create thread pool");
        pool.start().expect("Failed to start pool");
        pool
    }

    #[test]
    fn test_for_each_sums_primes() {
        let pool = started(4);
        let sum = Mutex::new(0u64);

        pool.for_each(&PRIMES, |prime| {
            *sum.lock() += *prime;
            Ok(())
        })
        .expect("for_each should succeed");

        assert_eq!(*sum.lock(), 1060);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_indexed_sums_primes() {
        let pool = started(4);
        let sum = Mutex::new(0u64);

        pool.for_each_indexed(0, PRIMES.len(), 1, |i| {
            *sum.lock() += PRIMES[i];
            Ok(())
        })
        .expect("for_each_indexed should succeed");

        assert_eq!(*sum.lock(), 1060);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_indexed_step() {
        let pool = started(2);
        let visited = Mutex::new(Vec::new());

        pool.for_each_indexed(3, 12, 4, |i| {
            visited.lock().push(i);
            Ok(())
        })
        .expect("for_each_indexed should succeed");

        let mut visited = visited.into_inner();
        visited.sort_unstable();
        assert_eq!(visited, vec![3, 7, 11]);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_indexed_empty_range() {
        let pool = started(2);
        let calls = AtomicUsize::new(0);

        pool.for_each_indexed(5, 5, 1, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .expect("Empty range should succeed");
        pool.for_each_indexed(9, 2, 1, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .expect("Reversed range should succeed");

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(pool.total_jobs_submitted(), 0);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_indexed_zero_step() {
        let pool = started(1);
        let result = pool.for_each_indexed(0, 10, 0, |_| Ok(()));
        assert!(matches!(result, Err(ThreadError::InvalidArgument { .. })));
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_runs_everything_and_reports_first_failure() {
        let pool = started(1);
        let calls = AtomicUsize::new(0);
        let items = [1, 2, 3, 4, 5];

        let result = pool.for_each(&items, |item| {
            calls.fetch_add(1, Ordering::Relaxed);
            if *item == 2 {
                Err(ThreadError::other("two"))
            } else if *item == 4 {
                panic!("four");
            } else {
                Ok(())
            }
        });

        assert_eq!(calls.load(Ordering::Relaxed), 5);
        match result {
            Err(ThreadError::ExecutionError { message, .. }) => assert!(message.contains("two")),
            other => panic!("Expected ExecutionError, got {:?}", other),
        }

        pool.finish_all_jobs();
        assert_eq!(pool.total_jobs_failed(), 1);
        assert_eq!(pool.total_jobs_panicked(), 1);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_blocks_until_done() {
        let pool = started(3);
        let done = AtomicUsize::new(0);
        let items = vec![Duration::from_millis(5); 9];

        pool.for_each(&items, |delay| {
            thread::sleep(*delay);
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("for_each should succeed");

        assert_eq!(done.load(Ordering::SeqCst), 9);
        pool.finish_all_jobs();
        assert!(pool.is_quiescent());
        pool.shutdown().expect("Failed to shutdown pool");
    }

    #[test]
    fn test_for_each_on_stopped_pool() {
        let pool = ThreadPool::with_threads(2).expect("Failed to create thread pool");
        let result = pool.for_each(&[1, 2, 3], |_| Ok(()));
        assert!(matches!(result, Err(ThreadError::PoolClosed { .. })));
    }
}
