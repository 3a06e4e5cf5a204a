//! # Job Pool
//!
//! A general-purpose pool of worker threads executing submitted jobs from a
//! shared FIFO queue.
//!
//! ## Features
//!
//! - **Lifecycle control**: start, pause/resume, drain, graceful or immediate shutdown
//! - **Resizing**: rebuild the worker set at any time without losing queued jobs
//! - **Completion handles**: wait for a job, with or without a timeout, and collect its result
//! - **Batch helpers**: run a closure over a borrowed slice or an index range and wait for all of it
//! - **Shared pool**: a process-wide pool that lives as long as someone holds it
//! - **Worker Statistics**: per-worker counters that survive resizes
//!
//! ## Quick Start
//!
//! ```rust
//! use job_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // Create and start a thread pool
//! let pool = ThreadPool::with_threads(4)?;
//! pool.start()?;
//!
//! // Fire-and-forget
//! for i in 0..10 {
//!     pool.execute(move || {
//!         log::debug!("job {} executing", i);
//!         Ok(())
//!     })?;
//! }
//!
//! // With a result
//! let square = pool.submit_for_return(|| 125 * 125)?;
//! assert_eq!(square.get()?, 15625);
//!
//! // Drain the queue and stop the workers
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Pool Configuration
//!
//! ```rust
//! use job_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = ThreadPoolConfig::new(8)
//!     .with_thread_name_prefix("my-worker")
//!     .with_auto_restart(true);
//!
//! let pool = ThreadPool::with_config(config)?;
//! pool.start()?;
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Jobs
//!
//! ```rust
//! use job_pool::prelude::*;
//!
//! struct MyJob {
//!     data: String,
//! }
//!
//! impl Job for MyJob {
//!     fn execute(&mut self) -> Result<()> {
//!         log::info!("processing: {}", self.data);
//!         Ok(())
//!     }
//!
//!     fn job_type(&self) -> &str {
//!         "MyJob"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! # let pool = ThreadPool::with_threads(2)?;
//! # pool.start()?;
//! pool.submit(MyJob {
//!     data: "test".to_string(),
//! })?;
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pausing and Resizing
//!
//! ```rust
//! use job_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::with_threads(2)?;
//! pool.start()?;
//!
//! pool.pause();
//! let mut job = pool.submit_waitable(|| Ok(()))?;
//! assert_eq!(job.wait_for(Duration::from_millis(20)), WaitStatus::Timeout);
//!
//! pool.set_thread_count(4)?;
//! pool.resume()?;
//! job.wait();
//!
//! println!("Total jobs: {}", pool.total_jobs_processed());
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod tracing;

pub use self::core::{BoxedJob, ClosureJob, Job, JobHandle, Result, ThreadError, WaitStatus, Waitable};
pub use self::pool::{
    shared_pool, PoolState, PoolStats, ThreadPool, ThreadPoolConfig, WorkerStats,
};
