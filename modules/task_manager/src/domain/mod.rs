pub mod error;
pub mod model;
pub mod runners;
pub mod service;
mod store;

pub use error::{RunnerError, TaskError};
pub use model::{
    Progress, Task, TaskId, TaskListSnapshot, TaskSnapshot, TaskStatus, TaskWatchEvent, WatchEventKind,
};
pub use runners::{runner_for_type, Runner, RunnerHandle};
pub use service::{SubscriptionGuard, TaskService, WatchSubscription};
