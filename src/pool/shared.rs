//! Process-wide shared pool.
//!
//! Every caller of [`shared_pool`] gets an `Arc` to the same running pool for
//! as long as at least one of those `Arc`s is alive. When the last one is
//! dropped the pool shuts down gracefully, and the next call creates a fresh
//! pool sized to the number of CPUs.

use crate::core::Result;
use crate::pool::thread_pool::ThreadPool;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

static SHARED: Mutex<Weak<ThreadPool>> = parking_lot::const_mutex(Weak::new());

/// Get a handle to the shared pool, creating and starting it if no handle is
/// currently alive.
///
/// ```
/// # fn main() -> job_pool::Result<()> {
/// let a = job_pool::shared_pool()?;
/// let b = job_pool::shared_pool()?;
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// # Ok(())
/// # }
/// ```
pub fn shared_pool() -> Result<Arc<ThreadPool>> {
    let mut slot = SHARED.lock();
    if let Some(pool) = slot.upgrade() {
        return Ok(pool);
    }

    let pool = Arc::new(ThreadPool::new()?);
    pool.start()?;
    *slot = Arc::downgrade(&pool);

    log::debug!("created shared pool with {} workers", pool.thread_count());
    Ok(pool)
}

/// Number of live handles to the shared pool
pub fn shared_pool_handles() -> usize {
    SHARED.lock().strong_count()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the shared slot is process-global state.
    #[test]
    fn test_shared_pool_lifecycle() {
        let first = shared_pool().expect("Failed to get shared pool");
        let second = shared_pool().expect("Failed to get shared pool");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(shared_pool_handles(), 2);
        assert!(first.is_running());
        assert_eq!(first.thread_count(), num_cpus::get());

        let handle = second
            .submit_for_return(|| 6 * 7)
            .expect("Failed to submit job");
        assert_eq!(handle.get().expect("Job should succeed"), 42);

        let old = Arc::downgrade(&first);
        drop(first);
        drop(second);
        assert_eq!(shared_pool_handles(), 0);
        assert!(old.upgrade().is_none());

        let fresh = shared_pool().expect("Failed to recreate shared pool");
        assert!(fresh.is_running());
        assert_eq!(fresh.total_jobs_submitted(), 0);
    }
}
