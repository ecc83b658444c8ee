//! Async facade over [`Store`]. Every public method here takes the lock for
//! a single synchronous call and releases it before doing anything that
//! awaits — runner invocations are spawned as detached tasks, never run
//! with the lock held.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::{RunnerError, TaskError};
use super::model::{Progress, Task, TaskId, TaskListSnapshot, TaskSnapshot, TaskWatchEvent};
use super::runners::{Runner, RunnerHandle};
use super::store::Store;
use crate::config::TaskManagerConfig;

const DEFAULT_LIST_LIMIT: usize = 50;

pub struct TaskService {
    store: Mutex<Store>,
}

enum SubscriptionKind {
    Snapshot,
    Watch,
}

/// Cancels a subscription when dropped semantics aren't enough on their own
/// (the channel also closes once the sender side is removed from the
/// store), so callers can either hold this until they're done or call
/// [`SubscriptionGuard::cancel`] explicitly to free the slot immediately.
pub struct SubscriptionGuard {
    service: Arc<TaskService>,
    id: u64,
    kind: SubscriptionKind,
}

impl SubscriptionGuard {
    pub fn cancel(self) {
        let mut store = self.service.store.lock();
        match self.kind {
            SubscriptionKind::Snapshot => store.unsubscribe_snapshot(self.id),
            SubscriptionKind::Watch => store.unsubscribe_watch(self.id),
        }
    }
}

/// Outcome of [`TaskService::subscribe_watch`]: either an active, possibly
/// replaying subscription, or notice that `sinceRV` has fallen out of the
/// ring and the caller must re-list before retrying.
pub enum WatchSubscription {
    Active {
        events: mpsc::Receiver<TaskWatchEvent>,
        guard: SubscriptionGuard,
    },
    Expired {
        current_resource_version: u64,
    },
}

impl TaskService {
    pub fn new(config: TaskManagerConfig) -> Arc<Self> {
        let max_workers = config.max_workers.max(1);
        let max_history = config.max_history.max(1);
        let max_events = config.max_events.max(1);
        Arc::new(Self {
            store: Mutex::new(Store::new(max_workers, max_history, max_events)),
        })
    }

    pub fn enqueue(
        self: &Arc<Self>,
        task_type: impl Into<String>,
        title: impl Into<String>,
        meta: serde_json::Value,
        runner: Runner,
    ) -> Task {
        let task = {
            let mut store = self.store.lock();
            store.enqueue(task_type.into(), title.into(), meta, runner)
        };
        debug!(task_id = %task.id, task_type = %task.task_type, "task enqueued");
        self.dispatch();
        task
    }

    pub fn cancel(&self, id: TaskId) -> Result<(), TaskError> {
        self.store.lock().cancel(id)
    }

    pub fn list_snapshot(&self, history_limit: usize) -> TaskListSnapshot {
        let limit = if history_limit == 0 { DEFAULT_LIST_LIMIT } else { history_limit };
        self.store.lock().list_snapshot(limit)
    }

    pub fn list_running(&self) -> Vec<Task> {
        self.store.lock().list_running()
    }

    pub fn list_history(&self, limit: usize) -> Vec<Task> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        self.store.lock().list_history(limit)
    }

    pub fn resource_version(&self) -> u64 {
        self.store.lock().resource_version()
    }

    pub fn subscribe(self: &Arc<Self>) -> (mpsc::Receiver<TaskSnapshot>, SubscriptionGuard) {
        let (id, rx) = self.store.lock().subscribe();
        (
            rx,
            SubscriptionGuard {
                service: Arc::clone(self),
                id,
                kind: SubscriptionKind::Snapshot,
            },
        )
    }

    pub fn subscribe_watch(self: &Arc<Self>, since_rv: u64) -> WatchSubscription {
        let (id, rx, ok) = self.store.lock().subscribe_watch(since_rv);
        if !ok {
            return WatchSubscription::Expired {
                current_resource_version: self.resource_version(),
            };
        }
        WatchSubscription::Active {
            events: rx.expect("subscribe_watch returned ok=true without a receiver"),
            guard: SubscriptionGuard {
                service: Arc::clone(self),
                id,
                kind: SubscriptionKind::Watch,
            },
        }
    }

    pub(crate) fn report_progress(&self, id: TaskId, progress: Progress) {
        self.store.lock().update_progress(id, progress);
    }

    pub(crate) fn report_note(&self, id: TaskId, note: String) {
        self.store.lock().set_note(id, note);
    }

    /// Promote as many queued tasks as current capacity allows, spawning a
    /// detached task per promotion. Safe to call redundantly; a call with
    /// no capacity or no queued work is a no-op.
    fn dispatch(self: &Arc<Self>) {
        loop {
            let promoted = self.store.lock().try_promote();
            let Some((id, runner, cancel)) = promoted else {
                break;
            };
            let service = Arc::clone(self);
            tokio::spawn(async move {
                let handle = RunnerHandle::new(id, Arc::clone(&service), cancel);
                let outcome = (runner)(handle).await;
                service.finish(id, outcome);
            });
        }
    }

    fn finish(self: &Arc<Self>, id: TaskId, outcome: Result<(), RunnerError>) {
        if let Err(RunnerError::Failed(ref msg)) = outcome {
            warn!(task_id = %id, error = %msg, "task failed");
        }
        self.store.lock().finish(id, outcome);
        self.dispatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskManagerConfig;
    use crate::domain::model::TaskStatus;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn service_with(max_workers: usize, max_history: usize, max_events: usize) -> Arc<TaskService> {
        TaskService::new(TaskManagerConfig {
            max_workers,
            max_history,
            max_events,
        })
    }

    /// A runner that blocks until a shared gate hands out a permit, then
    /// succeeds. Lets tests drive exactly when a running task completes.
    fn gated_runner(gate: Arc<Semaphore>) -> Runner {
        Arc::new(move |handle: RunnerHandle| {
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                let permit = gate.acquire_owned().await.expect("gate open");
                permit.forget();
                let _ = handle.task_id();
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn capacity_limits_concurrent_running_tasks() {
        let service = service_with(2, 200, 2048);
        let gate = Arc::new(Semaphore::new(0));

        for i in 0..5 {
            service.enqueue("gated", format!("task-{i}"), serde_json::Value::Null, gated_runner(Arc::clone(&gate)));
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let running = service.list_running();
        assert_eq!(running.len(), 2);
        let snapshot = service.list_snapshot(50);
        assert_eq!(snapshot.active.len(), 5);

        for _ in 0..5 {
            gate.add_permits(1);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let running = service.list_running();
            assert!(running.len() <= 2);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(service.list_running().len(), 0);
        assert_eq!(service.list_history(50).len(), 5);
    }

    #[tokio::test]
    async fn cancel_queued_task_promotes_the_next_one() {
        let service = service_with(1, 200, 2048);
        let gate = Arc::new(Semaphore::new(0));

        let t1 = service.enqueue("gated", "t1", serde_json::Value::Null, gated_runner(Arc::clone(&gate)));
        let t2 = service.enqueue("gated", "t2", serde_json::Value::Null, gated_runner(Arc::clone(&gate)));
        let _t3 = service.enqueue("gated", "t3", serde_json::Value::Null, gated_runner(Arc::clone(&gate)));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(service.list_running().len(), 1);

        service.cancel(t2.id).unwrap();
        let history = service.list_history(50);
        let canceled = history.iter().find(|t| t.id == t2.id).unwrap();
        assert_eq!(canceled.status, TaskStatus::Canceled);
        assert_eq!(canceled.error.as_deref(), Some("canceled"));
        assert!(canceled.ended_at.is_some());
        assert!(service.list_running().iter().any(|t| t.id == t1.id));

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(service.list_running().iter().all(|t| t.id != t1.id));
        assert!(
            service.list_running().iter().any(|t| t.status == TaskStatus::Running),
            "task 3 should have been promoted once task 1 finished"
        );
    }

    #[tokio::test]
    async fn cancel_running_task_emits_signal_then_terminal_event() {
        let service = service_with(1, 200, 2048);
        let cancel_aware_runner: Runner = Arc::new(|handle: RunnerHandle| {
            Box::pin(async move {
                handle.cancellation_token().cancelled().await;
                Err(RunnerError::Canceled)
            })
        });

        let (mut events, _guard) = match service.subscribe_watch(0) {
            WatchSubscription::Active { events, guard } => (events, guard),
            WatchSubscription::Expired { .. } => panic!("sinceRV=0 must always subscribe"),
        };

        let task = service.enqueue("cancel-aware", "t1", serde_json::Value::Null, cancel_aware_runner);
        tokio::time::sleep(Duration::from_millis(10)).await;

        service.cancel(task.id).unwrap();

        let mut saw_running_modified = false;
        let mut saw_terminal = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
                Ok(Some(ev)) if ev.task.id == task.id => {
                    if ev.task.status == TaskStatus::Running {
                        saw_running_modified = true;
                    }
                    if ev.task.status == TaskStatus::Canceled {
                        saw_terminal = true;
                        break;
                    }
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        assert!(saw_running_modified, "expected a MODIFIED event when promoted to running");
        assert!(saw_terminal, "expected a terminal MODIFIED event with status canceled");
    }

    #[tokio::test]
    async fn progress_updates_observed_in_order() {
        let service = service_with(1, 200, 2048);
        let steps = 20i64;
        let runner = super::super::runners::sleep_runner(steps, Duration::from_millis(1));

        let (mut events, _guard) = match service.subscribe_watch(0) {
            WatchSubscription::Active { events, guard } => (events, guard),
            WatchSubscription::Expired { .. } => panic!("sinceRV=0 must always subscribe"),
        };
        let task = service.enqueue("sleep", "t1", serde_json::Value::Null, runner);

        let mut last_done = 0i64;
        let mut saw_succeeded = false;
        while !saw_succeeded {
            let ev = match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
                Ok(Some(ev)) => ev,
                _ => break,
            };
            if ev.task.id != task.id {
                continue;
            }
            assert!(ev.task.progress.done >= last_done, "progress went backwards");
            last_done = ev.task.progress.done;
            if ev.task.status == TaskStatus::Succeeded {
                saw_succeeded = true;
            }
        }
        assert!(saw_succeeded);
        assert_eq!(last_done, steps);
    }

    #[tokio::test]
    async fn watch_expires_once_ring_evicts_the_requested_version() {
        let service = service_with(4, 200, 4);
        for i in 0..10 {
            service.enqueue("noop", format!("t{i}"), serde_json::Value::Null, Arc::new(|_h| Box::pin(async { Ok(()) })));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        match service.subscribe_watch(1) {
            WatchSubscription::Expired { .. } => {}
            WatchSubscription::Active { .. } => panic!("expected sinceRV=1 to have been evicted"),
        }

        let snapshot = service.list_snapshot(50);
        match service.subscribe_watch(snapshot.resource_version) {
            WatchSubscription::Active { .. } => {}
            WatchSubscription::Expired { .. } => panic!("current resource_version must still be covered"),
        }
    }

    #[tokio::test]
    async fn failed_runner_records_error_and_terminal_status() {
        let service = service_with(1, 200, 2048);
        let runner = super::super::runners::fail_runner("disk full", Duration::from_millis(5));
        let task = service.enqueue("fail", "t1", serde_json::Value::Null, runner);

        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if service
                .list_history(50)
                .iter()
                .any(|t| t.id == task.id && t.status.is_terminal())
            {
                break;
            }
        }

        let history = service.list_history(50);
        let finished = history.iter().find(|t| t.id == task.id).expect("task finished");
        assert_eq!(finished.status, TaskStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("disk full"));
        assert!(finished.ended_at.is_some());
    }
}
