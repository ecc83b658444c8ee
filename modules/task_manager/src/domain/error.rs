use thiserror::Error;

use super::model::TaskId;

/// Errors surfaced by the core (spec §7): not-found, runner-error, canceled.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Terminal outcome of a runner invocation, reported by the runner itself.
///
/// Rust has no universal "context canceled" sentinel to pattern-match on, so
/// the cancellation case is an explicit variant instead of a wrapped error:
/// a runner that observes its cancellation token must return
/// `RunnerError::Canceled` rather than any other error value.
#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    #[error("canceled")]
    Canceled,
    #[error("{0}")]
    Failed(String),
}

impl RunnerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
