use thiserror::Error;

use super::model::TaskId;

/// Errors that are safe to expose to other modules.
#[derive(Error, Debug, Clone)]
pub enum TasksError {
    #[error("task not found: {id}")]
    NotFound { id: TaskId },

    #[error("unknown task type: {task_type}")]
    UnknownTaskType { task_type: String },

    #[error("internal error")]
    Internal,
}

impl TasksError {
    pub fn not_found(id: TaskId) -> Self {
        Self::NotFound { id }
    }

    pub fn unknown_task_type(task_type: impl Into<String>) -> Self {
        Self::UnknownTaskType {
            task_type: task_type.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}

impl From<crate::domain::TaskError> for TasksError {
    fn from(err: crate::domain::TaskError) -> Self {
        match err {
            crate::domain::TaskError::NotFound(id) => Self::NotFound { id },
        }
    }
}
