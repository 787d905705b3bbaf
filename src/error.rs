//! Error types for the executor
//!
//! All failures surfaced by this crate fall into the four categories below.
//! Task-body panics never escape the worker loop; they are reported through
//! the task's promise as [`ExecutorError::TaskPanicked`].

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Errors surfaced by the executor and its promises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Admission refused: the queue is full or the executor is past `Started`.
    #[error("task rejected: {0}")]
    RejectedExecution(String),

    /// Invalid operation for the current state, e.g. completing an
    /// already-completed promise.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The requested capability is not provided by this executor kind.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// A task body panicked while executing on the worker.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl ExecutorError {
    /// Shorthand for a rejection with the given reason.
    #[inline]
    pub fn rejected(reason: impl Into<String>) -> Self {
        ExecutorError::RejectedExecution(reason.into())
    }

    /// Shorthand for an illegal-state error with the given description.
    #[inline]
    pub fn illegal_state(what: impl Into<String>) -> Self {
        ExecutorError::IllegalState(what.into())
    }
}
