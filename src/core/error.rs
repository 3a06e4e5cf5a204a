//! Error types for the job pool

/// Result type for job pool operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur in the job pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// Submission attempted while the pool has no active workers
    #[error("Job pool '{pool_name}' is closed: no active workers")]
    PoolClosed {
        /// Name of the pool
        pool_name: String,
    },

    /// Job body returned an error or panicked
    #[error("Job execution failed (job_id: {job_id}): {message}")]
    ExecutionError {
        /// ID of the failed job
        job_id: u64,
        /// Error message
        message: String,
    },

    /// Job was discarded before a worker ever ran it
    #[error("Job abandoned before execution (job_id: {job_id})")]
    Abandoned {
        /// ID of the discarded job
        job_id: u64,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Invalid argument passed to a pool operation
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Argument name
        argument: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl ThreadError {
    /// Create a pool closed error
    pub fn pool_closed(pool_name: impl Into<String>) -> Self {
        ThreadError::PoolClosed {
            pool_name: pool_name.into(),
        }
    }

    /// Create an execution error
    pub fn execution(job_id: u64, message: impl Into<String>) -> Self {
        ThreadError::ExecutionError {
            job_id,
            message: message.into(),
        }
    }

    /// Create an abandoned error
    pub fn abandoned(job_id: u64) -> Self {
        ThreadError::Abandoned { job_id }
    }

    /// Create a spawn error
    pub fn spawn(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ThreadError::Other(msg.into())
    }

    /// True for errors raised by the job body itself rather than by the pool
    pub fn is_job_failure(&self) -> bool {
        matches!(self, ThreadError::ExecutionError { .. })
    }
}

/// Renders a `catch_unwind` payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ThreadError::pool_closed("main_pool");
        assert!(matches!(err, ThreadError::PoolClosed { .. }));

        let err = ThreadError::abandoned(7);
        assert!(matches!(err, ThreadError::Abandoned { job_id: 7 }));

        let err = ThreadError::execution(123, "Panic in task");
        assert!(err.is_job_failure());
    }

    #[test]
    fn test_error_display() {
        let err = ThreadError::pool_closed("worker");
        assert_eq!(
            err.to_string(),
            "Job pool 'worker' is closed: no active workers"
        );

        let err = ThreadError::execution(456, "boom");
        assert_eq!(
            err.to_string(),
            "Job execution failed (job_id: 456): boom"
        );

        let err = ThreadError::invalid_argument("step", "must be non-zero");
        assert_eq!(err.to_string(), "Invalid argument 'step': must be non-zero");
    }

    #[test]
    fn test_spawn_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = ThreadError::spawn_with_source(5, "Cannot create thread", io_err);

        assert!(matches!(err, ThreadError::SpawnError { .. }));
        assert!(err.to_string().contains("worker thread #5"));
        assert!(!err.is_job_failure());
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
