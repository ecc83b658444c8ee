use async_trait::async_trait;

use super::error::TasksError;
use super::model::{Task, TaskId, TaskListSnapshot};

/// Public API other modules use to enqueue and inspect tasks without
/// depending on task_manager's internals.
#[async_trait]
pub trait TasksApi: Send + Sync {
    /// Enqueue a new task of `task_type`. Fails if no runner is registered
    /// for that type.
    async fn enqueue_task(
        &self,
        task_type: String,
        title: String,
        meta: serde_json::Value,
    ) -> Result<Task, TasksError>;

    /// Cancel a queued or running task.
    async fn cancel_task(&self, id: TaskId) -> Result<(), TasksError>;

    /// A consistent snapshot of active and recent tasks.
    async fn get_snapshot(&self) -> Result<TaskListSnapshot, TasksError>;
}
