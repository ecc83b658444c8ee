use serde::{Deserialize, Serialize};

fn default_max_workers() -> usize {
    2
}

fn default_max_history() -> usize {
    200
}

fn default_max_events() -> usize {
    2048
}

/// Module configuration, read from the `task_manager.config` section of the
/// app config. All fields have defaults so the module runs unconfigured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerConfig {
    /// Maximum number of tasks allowed to run concurrently.
    pub max_workers: usize,
    /// Maximum number of terminal tasks retained in history.
    pub max_history: usize,
    /// Maximum number of events retained in the watch ring buffer.
    pub max_events: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_history: default_max_history(),
            max_events: default_max_events(),
        }
    }
}
