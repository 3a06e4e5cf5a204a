//! Basic job pool usage example
//!
//! Demonstrates pool creation, fire-and-forget and waitable jobs, pausing,
//! resizing, batch helpers and statistics.
//!
//! Run with: RUST_LOG=debug cargo run --example basic_usage

use job_pool::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Job Pool - Basic Usage Example ===\n");

    let pool = ThreadPool::with_config(ThreadPoolConfig::new(4).with_thread_name_prefix("demo"))?;

    println!("1. Starting pool with {} threads", pool.num_threads());
    pool.start()?;

    println!("\n2. Submitting simple jobs:");
    for i in 0..10 {
        pool.execute(move || {
            println!(
                "  Job {} executing on {}",
                i,
                thread::current().name().unwrap_or("?")
            );
            thread::sleep(Duration::from_millis(20));
            Ok(())
        })?;
    }
    pool.finish_all_jobs();
    println!("   All 10 jobs finished");

    println!("\n3. Waiting for a result:");
    let square = pool.submit_for_return(|| 125 * 125)?;
    println!("   125 * 125 = {}", square.get()?);

    println!("\n4. Pausing:");
    pool.pause();
    let mut pending = pool.submit_waitable(|| Ok(()))?;
    println!(
        "   While paused: {:?}",
        pending.wait_for(Duration::from_millis(50))
    );
    pool.resume()?;
    println!(
        "   After resume: {:?}",
        pending.wait_for(Duration::from_secs(1))
    );

    println!("\n5. Resizing to a single worker:");
    pool.set_thread_count(1)?;
    println!("   Live workers: {}", pool.thread_count());

    println!("\n6. Summing primes with for_each:");
    let primes = [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29];
    let sum = AtomicU64::new(0);
    pool.for_each(&primes, |p| {
        sum.fetch_add(*p, Ordering::Relaxed);
        Ok(())
    })?;
    println!("   Sum: {}", sum.load(Ordering::Relaxed));

    println!("\n7. Per-worker statistics:");
    for (i, stat) in pool.get_stats().iter().enumerate() {
        println!(
            "   Worker {}: {} processed, {} failed, avg time: {:.2}μs",
            i,
            stat.get_jobs_processed(),
            stat.get_jobs_failed(),
            stat.get_average_processing_time_us()
        );
    }

    println!("\n8. Pool statistics:");
    let stats = serde_json::to_string_pretty(&pool.stats())
        .map_err(|e| ThreadError::other(format!("Cannot serialize stats: {}", e)))?;
    println!("{}", stats);

    println!("\n9. Shutting down...");
    pool.shutdown()?;
    println!("   Total jobs processed: {}", pool.total_jobs_processed());

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
