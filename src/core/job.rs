//! Job trait and related types

use crate::core::error::Result;
use std::fmt;

/// A unit of work executed once by one worker of the pool.
///
/// Anything the job needs is owned by the implementor. Arguments are bound at
/// construction time by value; state shared with the submitter goes through
/// explicit handles such as `Arc<Mutex<_>>`.
pub trait Job: Send {
    /// Execute the job
    ///
    /// # Errors
    ///
    /// Returns an error if the job execution fails
    fn execute(&mut self) -> Result<()>;

    /// Get the job's type name for debugging and statistics
    fn job_type(&self) -> &str {
        "Job"
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.job_type())
    }
}

/// A boxed job that can be sent across threads
pub type BoxedJob = Box<dyn Job>;

/// Helper to create a job from a closure
pub struct ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    name: &'static str,
}

impl<F> ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Create a new closure job
    pub fn new(closure: F) -> Self {
        Self::with_name(closure, "ClosureJob")
    }

    /// Create a new closure job with a custom name
    pub fn with_name(closure: F, name: &'static str) -> Self {
        Self {
            closure: Some(closure),
            name,
        }
    }
}

impl<F> Job for ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        match self.closure.take() {
            Some(closure) => closure(),
            None => Err(crate::core::ThreadError::other(
                "ClosureJob already executed - cannot execute twice",
            )),
        }
    }

    fn job_type(&self) -> &str {
        self.name
    }
}
