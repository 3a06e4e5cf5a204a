//! Convenient re-exports for common types and traits

pub use crate::core::{
    BoxedJob, ClosureJob, Job, JobHandle, Result, ThreadError, WaitStatus, Waitable,
};
pub use crate::pool::{shared_pool, PoolState, ThreadPool, ThreadPoolConfig, WorkerStats};
