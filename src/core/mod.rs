//! Core types and traits for the job pool

pub mod error;
pub mod handle;
pub mod job;

pub use error::{Result, ThreadError};
pub use handle::{JobHandle, WaitStatus, Waitable};
pub use job::{BoxedJob, ClosureJob, Job};
