//! Property-based tests for job_pool using proptest

use job_pool::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// ThreadPoolConfig Tests
// ============================================================================

proptest! {
    /// Any positive thread count with a non-empty prefix is a valid config
    #[test]
    fn test_config_valid(threads in 1usize..32, prefix in "[a-z]{1,10}") {
        let config = ThreadPoolConfig::new(threads).with_thread_name_prefix(prefix);
        prop_assert!(config.validate().is_ok());
        prop_assert_eq!(config.num_threads, threads);
    }

    /// Test that ThreadPool with config can be created without spawning threads
    #[test]
    fn test_pool_creation_with_config(threads in 1usize..8, auto_restart in any::<bool>()) {
        let config = ThreadPoolConfig::new(threads).with_auto_restart(auto_restart);
        let pool = ThreadPool::with_config(config).expect("Failed to create pool");

        prop_assert_eq!(pool.state(), PoolState::Stopped);
        prop_assert_eq!(pool.thread_count(), 0);
        prop_assert_eq!(pool.num_threads(), threads);
    }
}

// ============================================================================
// Job Execution Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every accepted job runs exactly once
    #[test]
    fn test_multiple_job_execution(threads in 1usize..6, job_count in 1usize..200) {
        let pool = ThreadPool::with_threads(threads).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..job_count {
            let counter_clone = Arc::clone(&counter);
            pool.execute(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }).expect("Failed to submit job");
        }

        pool.finish_all_jobs();
        prop_assert_eq!(counter.load(Ordering::SeqCst), job_count);
        prop_assert_eq!(pool.total_jobs_processed(), job_count as u64);
        pool.shutdown().expect("Failed to shutdown pool");
    }

    /// Handles deliver exactly the value computed from each input
    #[test]
    fn test_return_values(values in prop::collection::vec(any::<i32>(), 1..50)) {
        let pool = ThreadPool::with_threads(3).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let handles: Vec<_> = values
            .iter()
            .map(|&v| pool.submit_for_return(move || i64::from(v) * 2).expect("Failed to submit job"))
            .collect();

        let results: Vec<i64> = handles
            .into_iter()
            .map(|h| h.get().expect("Job should succeed"))
            .collect();
        let expected: Vec<i64> = values.iter().map(|&v| i64::from(v) * 2).collect();
        prop_assert_eq!(results, expected);

        pool.shutdown().expect("Failed to shutdown pool");
    }

    /// A single worker executes jobs in submission order
    #[test]
    fn test_single_worker_fifo(values in prop::collection::vec(any::<u16>(), 1..100)) {
        let pool = ThreadPool::with_threads(1).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let seen = Arc::new(Mutex::new(Vec::new()));
        for &v in &values {
            let seen_clone = Arc::clone(&seen);
            pool.execute(move || {
                seen_clone.lock().push(v);
                Ok(())
            }).expect("Failed to submit job");
        }

        pool.shutdown().expect("Failed to shutdown pool");
        prop_assert_eq!(&*seen.lock(), &values);
    }
}

// ============================================================================
// Panic Isolation Tests (Reliability)
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Test that worker threads survive job panics
    #[test]
    fn test_panic_isolation(panic_count in 1usize..10, success_count in 1usize..10) {
        let pool = ThreadPool::with_threads(2).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..panic_count {
            pool.execute(|| panic!("Intentional panic for testing"))
                .expect("Failed to submit job");
        }
        for _ in 0..success_count {
            let counter_clone = Arc::clone(&counter);
            pool.execute(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }).expect("Failed to submit job");
        }

        pool.finish_all_jobs();
        prop_assert_eq!(counter.load(Ordering::SeqCst), success_count);
        prop_assert_eq!(pool.total_jobs_panicked(), panic_count as u64);
        prop_assert_eq!(pool.running_jobs(), 0);
        pool.shutdown().expect("Failed to shutdown pool");
    }
}

// ============================================================================
// Worker Statistics Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Sum of per-worker stats equals the pool total
    #[test]
    fn test_individual_worker_stats(threads in 1usize..8, jobs in 1usize..100) {
        let pool = ThreadPool::with_threads(threads).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        for _ in 0..jobs {
            pool.execute(|| Ok(())).expect("Failed to submit job");
        }
        pool.finish_all_jobs();

        let stats = pool.get_stats();
        prop_assert_eq!(stats.len(), threads);
        let sum: u64 = stats.iter().map(|s| s.get_jobs_processed()).sum();
        prop_assert_eq!(sum, jobs as u64);

        pool.shutdown().expect("Failed to shutdown pool");
    }

    /// Totals are kept across any sequence of resizes
    #[test]
    fn test_stats_across_resizes(sizes in prop::collection::vec(1usize..6, 1..5), per_round in 1usize..20) {
        let pool = ThreadPool::with_threads(2).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        for &size in &sizes {
            for _ in 0..per_round {
                pool.execute(|| Ok(())).expect("Failed to submit job");
            }
            pool.set_thread_count(size).expect("Failed to resize");
            prop_assert_eq!(pool.thread_count(), size);
        }
        pool.finish_all_jobs();

        prop_assert_eq!(pool.total_jobs_processed(), (sizes.len() * per_round) as u64);
        pool.shutdown().expect("Failed to shutdown pool");
    }
}

// ============================================================================
// Batch Helper Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// for_each_indexed visits exactly the indices of the stepped range
    #[test]
    fn test_for_each_indexed_visits_range(from in 0usize..50, len in 0usize..100, step in 1usize..7) {
        let pool = ThreadPool::with_threads(3).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let to = from + len;
        let visited = Mutex::new(Vec::new());
        pool.for_each_indexed(from, to, step, |i| {
            visited.lock().push(i);
            Ok(())
        }).expect("for_each_indexed should succeed");

        let mut visited = visited.into_inner();
        visited.sort_unstable();
        let expected: Vec<usize> = (from..to).step_by(step).collect();
        prop_assert_eq!(visited, expected);

        pool.shutdown().expect("Failed to shutdown pool");
    }

    /// for_each sees every element once
    #[test]
    fn test_for_each_sum(values in prop::collection::vec(0u32..1000, 0..100)) {
        let pool = ThreadPool::with_threads(4).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        let sum = Mutex::new(0u64);
        pool.for_each(&values, |v| {
            *sum.lock() += u64::from(*v);
            Ok(())
        }).expect("for_each should succeed");

        let expected: u64 = values.iter().map(|&v| u64::from(v)).sum();
        prop_assert_eq!(*sum.lock(), expected);

        pool.shutdown().expect("Failed to shutdown pool");
    }
}

// ============================================================================
// Safety Tests (No Panics)
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Shutdown, forced shutdown and repeated shutdown are always safe
    #[test]
    fn test_shutdown_always_safe(threads in 1usize..8, jobs in 0usize..20, forced in any::<bool>()) {
        let pool = ThreadPool::with_threads(threads).expect("Failed to create pool");
        pool.start().expect("Failed to start pool");

        for _ in 0..jobs {
            pool.execute(|| Ok(())).expect("Failed to submit job");
        }

        if forced {
            let discarded = pool.shutdown_now().expect("Forced shutdown failed");
            prop_assert!(discarded <= jobs);
        } else {
            pool.shutdown().expect("Shutdown failed");
            prop_assert_eq!(pool.total_jobs_processed(), jobs as u64);
        }

        prop_assert!(pool.shutdown().is_ok());
        prop_assert_eq!(pool.state(), PoolState::Stopped);
    }

    /// Submitting to a stopped pool fails cleanly unless auto_restart is set
    #[test]
    fn test_submit_to_stopped_pool(auto_restart in any::<bool>()) {
        let config = ThreadPoolConfig::new(2).with_auto_restart(auto_restart);
        let pool = ThreadPool::with_config(config).expect("Failed to create pool");

        let result = pool.execute(|| Ok(()));
        if auto_restart {
            prop_assert!(result.is_ok());
            prop_assert!(pool.is_running());
            pool.shutdown().expect("Failed to shutdown pool");
        } else {
            let is_pool_closed = matches!(result, Err(ThreadError::PoolClosed { .. }));
            prop_assert!(is_pool_closed);
        }
    }
}
