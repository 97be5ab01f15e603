use std::time::Duration;

use prov_types::DecodeError;
use thiserror::Error;

/// Errors produced by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool could not be created (bad configuration or an execution
    /// environment the engine cannot run in).
    #[error("pool initialization failed: {0}")]
    Initialization(String),

    /// The pool was disposed before the job produced a reply.
    #[error("worker pool disposed")]
    Disposed,

    /// The job queue is full and the overflow policy is `Reject`.
    #[error("job queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The configured task timeout elapsed.
    #[error("worker call timed out after {0:?}")]
    Timeout(Duration),

    /// The engine rejected the module bytes.
    #[error("module compilation failed: {0}")]
    Compile(String),

    /// The worker-side computation failed. Carries the typed error.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The worker panicked while running the call.
    #[error("worker crashed during {method}: {message}")]
    WorkerCrashed { method: &'static str, message: String },

    /// The worker answered with a reply of the wrong shape.
    #[error("unexpected reply to {method}")]
    UnexpectedReply { method: &'static str },
}

pub type PoolResult<T> = Result<T, PoolError>;
