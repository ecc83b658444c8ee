use async_trait::async_trait;
use std::sync::Arc;

use crate::contract::{
    client::TasksApi,
    error::TasksError,
    model::{Task, TaskId, TaskListSnapshot},
};
use crate::domain::{runner_for_type, TaskService};

/// Local implementation of [`TasksApi`] that delegates straight to the
/// in-process service — no network hop, since task_manager only ever runs
/// in-process with its callers.
pub struct TasksLocalClient {
    service: Arc<TaskService>,
}

impl TasksLocalClient {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TasksApi for TasksLocalClient {
    async fn enqueue_task(
        &self,
        task_type: String,
        title: String,
        meta: serde_json::Value,
    ) -> Result<Task, TasksError> {
        let runner = runner_for_type(&task_type)
            .ok_or_else(|| TasksError::unknown_task_type(task_type.clone()))?;
        Ok(self.service.enqueue(task_type, title, meta, runner))
    }

    async fn cancel_task(&self, id: TaskId) -> Result<(), TasksError> {
        self.service.cancel(id).map_err(Into::into)
    }

    async fn get_snapshot(&self) -> Result<TaskListSnapshot, TasksError> {
        Ok(self.service.list_snapshot(200))
    }
}
