//! Thread pool and worker implementations

mod scoped;
pub mod shared;
pub mod thread_pool;
pub mod worker;

pub use shared::{shared_pool, shared_pool_handles};
pub use thread_pool::{PoolState, PoolStats, ThreadPool, ThreadPoolConfig};
pub use worker::{Worker, WorkerStatSnapshot, WorkerStats};
