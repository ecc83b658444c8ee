use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::contract::model::{Progress, Task, TaskListSnapshot, TaskStatus, TaskWatchEvent, WatchEventKind};

/// REST DTO for task progress; always present, zero-valued when unset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressDto {
    pub total: i64,
    pub done: i64,
    pub unit: String,
    pub note: String,
}

impl From<Progress> for ProgressDto {
    fn from(p: Progress) -> Self {
        Self {
            total: p.total,
            done: p.done,
            unit: p.unit,
            note: p.note,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatusDto {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl From<TaskStatus> for TaskStatusDto {
    fn from(s: TaskStatus) -> Self {
        match s {
            TaskStatus::Queued => Self::Queued,
            TaskStatus::Running => Self::Running,
            TaskStatus::Succeeded => Self::Succeeded,
            TaskStatus::Failed => Self::Failed,
            TaskStatus::Canceled => Self::Canceled,
        }
    }
}

/// REST DTO for a task, exactly the field set in spec.md §3 with
/// snake_case keys.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
    pub status: TaskStatusDto,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub progress: ProgressDto,
    pub error: Option<String>,
    pub meta: serde_json::Value,
}

impl From<Task> for TaskDto {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            task_type: t.task_type,
            title: t.title,
            status: t.status.into(),
            created_at: t.created_at,
            started_at: t.started_at,
            ended_at: t.ended_at,
            progress: t.progress.into(),
            error: t.error,
            meta: t.meta,
        }
    }
}

/// `POST /tasks` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTaskReq {
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
pub struct ListSnapshotQuery {
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
pub struct ListHistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
pub struct WatchQuery {
    pub since_rv: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskListSnapshotDto {
    pub resource_version: u64,
    pub active: Vec<TaskDto>,
    pub history: Vec<TaskDto>,
}

impl From<TaskListSnapshot> for TaskListSnapshotDto {
    fn from(s: TaskListSnapshot) -> Self {
        Self {
            resource_version: s.resource_version,
            active: s.active.into_iter().map(TaskDto::from).collect(),
            history: s.history.into_iter().map(TaskDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventKindDto {
    Added,
    Modified,
    Deleted,
}

impl From<WatchEventKind> for WatchEventKindDto {
    fn from(k: WatchEventKind) -> Self {
        match k {
            WatchEventKind::Added => Self::Added,
            WatchEventKind::Modified => Self::Modified,
            WatchEventKind::Deleted => Self::Deleted,
        }
    }
}

/// SSE payload for `GET /tasks/watch`: `{type, resource_version, task}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskWatchEventDto {
    #[serde(rename = "type")]
    pub kind: WatchEventKindDto,
    pub resource_version: u64,
    pub task: TaskDto,
}

impl From<TaskWatchEvent> for TaskWatchEventDto {
    fn from(e: TaskWatchEvent) -> Self {
        Self {
            kind: e.kind.into(),
            resource_version: e.resource_version,
            task: e.task.into(),
        }
    }
}

/// Payload for the named `expired` SSE event: the watch must resync from
/// `resource_version` by calling `GET /tasks` again.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WatchExpiredDto {
    pub resource_version: u64,
}
