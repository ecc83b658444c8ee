//! Core data model: `Task`, its lifecycle, progress, and the watch-event
//! envelope that carries a copy of a task out to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, collision-free task identity. Generated with `Uuid::new_v4`.
pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }
}

/// Progress carried verbatim from whatever the runner last reported.
/// `done <= total` is not enforced here; the runner may revise `total`
/// downward and the store just keeps the latest values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total: i64,
    pub done: i64,
    pub unit: String,
    pub note: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            total: 0,
            done: 0,
            unit: String::new(),
            note: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Free-form, domain-defined task category.
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub progress: Progress,
    /// Populated iff `status` is `failed` or `canceled`.
    pub error: Option<String>,
    /// Opaque caller payload, carried through unexamined.
    pub meta: serde_json::Value,
}

/// `Subscribe()`'s payload is a plain snapshot of `Task`; the wrapper name
/// exists so callers reading the API can tell a push update apart from a
/// list accessor's result even though the shape is identical.
pub type TaskSnapshot = Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWatchEvent {
    #[serde(rename = "type")]
    pub kind: WatchEventKind,
    pub resource_version: u64,
    pub task: Task,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListSnapshot {
    pub resource_version: u64,
    pub active: Vec<Task>,
    pub history: Vec<Task>,
}
