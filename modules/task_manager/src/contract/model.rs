//! Cross-module view of tasks. The domain model carries no persistence or
//! transport concerns of its own (no DB row type, no DTO to shadow), so the
//! contract re-exports it directly rather than duplicating an identical
//! struct the way `users_info` does for its DB-backed `User`.

pub use crate::domain::{Progress, Task, TaskId, TaskListSnapshot, TaskStatus, TaskWatchEvent, WatchEventKind};
