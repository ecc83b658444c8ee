//! Store: the single lock guarding the queue, the running set, history, the
//! resource-version counter, the event ring, and both subscriber tables.
//!
//! Every method here is synchronous and does O(queue length) / O(subscriber
//! count) work at most — no I/O, no awaiting, no runner invocation. The
//! service layer (`super::service`) takes the lock only for the duration of
//! one of these calls and never while a runner is executing.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{RunnerError, TaskError};
use super::model::{Progress, Task, TaskId, TaskListSnapshot, TaskSnapshot, TaskStatus, TaskWatchEvent, WatchEventKind};
use super::runners::Runner;

struct TaskRuntime {
    task: Task,
    cancel: CancellationToken,
    runner: Runner,
}

pub(crate) struct Store {
    max_workers: usize,
    max_history: usize,
    max_events: usize,

    tasks: HashMap<TaskId, TaskRuntime>,
    queue_order: VecDeque<TaskId>,
    running_order: VecDeque<TaskId>,
    history: VecDeque<Task>,

    resource_version: u64,
    ring: VecDeque<(u64, TaskWatchEvent)>,

    next_sub_id: u64,
    snapshot_subs: HashMap<u64, mpsc::Sender<TaskSnapshot>>,
    watch_subs: HashMap<u64, mpsc::Sender<TaskWatchEvent>>,
}

const SNAPSHOT_BUFFER: usize = 32;
const WATCH_BUFFER: usize = 256;

impl Store {
    pub(crate) fn new(max_workers: usize, max_history: usize, max_events: usize) -> Self {
        Self {
            max_workers,
            max_history,
            max_events,
            tasks: HashMap::new(),
            queue_order: VecDeque::new(),
            running_order: VecDeque::new(),
            history: VecDeque::new(),
            resource_version: 0,
            ring: VecDeque::new(),
            next_sub_id: 0,
            snapshot_subs: HashMap::new(),
            watch_subs: HashMap::new(),
        }
    }

    pub(crate) fn enqueue(
        &mut self,
        task_type: String,
        title: String,
        meta: serde_json::Value,
        runner: Runner,
    ) -> Task {
        let id = Uuid::new_v4();
        let task = Task {
            id,
            task_type,
            title,
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            progress: Progress::default(),
            error: None,
            meta,
        };
        let rt = TaskRuntime {
            task: task.clone(),
            cancel: CancellationToken::new(),
            runner,
        };
        self.tasks.insert(id, rt);
        self.queue_order.push_back(id);
        self.emit(WatchEventKind::Added, &task);
        task
    }

    /// Promote one queued task to running if capacity allows. Returns the
    /// id, its runner and cancellation token so the caller can spawn the
    /// runner invocation *after* releasing the lock.
    pub(crate) fn try_promote(&mut self) -> Option<(TaskId, Runner, CancellationToken)> {
        if self.running_order.len() >= self.max_workers {
            return None;
        }
        let id = self.queue_order.pop_front()?;
        let rt = self
            .tasks
            .get_mut(&id)
            .expect("queued task id missing from task table");
        rt.task.status = TaskStatus::Running;
        rt.task.started_at = Some(Utc::now());
        self.running_order.push_back(id);
        let snapshot = rt.task.clone();
        let runner = rt.runner.clone();
        let cancel = rt.cancel.clone();
        self.emit(WatchEventKind::Modified, &snapshot);
        Some((id, runner, cancel))
    }

    pub(crate) fn cancel(&mut self, id: TaskId) -> Result<(), TaskError> {
        if let Some(pos) = self.queue_order.iter().position(|&x| x == id) {
            self.queue_order.remove(pos);
            let rt = self.tasks.remove(&id).expect("queued id missing from task table");
            let mut task = rt.task;
            task.status = TaskStatus::Canceled;
            task.ended_at = Some(Utc::now());
            if task.error.is_none() {
                task.error = Some("canceled".to_string());
            }
            self.push_history(task.clone());
            self.emit(WatchEventKind::Modified, &task);
            return Ok(());
        }

        if let Some(rt) = self.tasks.get(&id) {
            if rt.task.status == TaskStatus::Running {
                rt.cancel.cancel();
                let snapshot = rt.task.clone();
                self.emit(WatchEventKind::Modified, &snapshot);
                return Ok(());
            }
        }

        Err(TaskError::NotFound(id))
    }

    /// Record a runner's terminal outcome: move the task from `running` to
    /// `history` and emit the terminal `MODIFIED` event.
    pub(crate) fn finish(&mut self, id: TaskId, outcome: Result<(), RunnerError>) {
        let rt = match self.tasks.remove(&id) {
            Some(rt) => rt,
            None => return,
        };
        if let Some(pos) = self.running_order.iter().position(|&x| x == id) {
            self.running_order.remove(pos);
        }
        let mut task = rt.task;
        task.ended_at = Some(Utc::now());
        match outcome {
            Ok(()) => task.status = TaskStatus::Succeeded,
            Err(RunnerError::Canceled) => {
                task.status = TaskStatus::Canceled;
                if task.error.is_none() {
                    task.error = Some("canceled".to_string());
                }
            }
            Err(RunnerError::Failed(msg)) => {
                task.status = TaskStatus::Failed;
                task.error = Some(msg);
            }
        }
        self.push_history(task.clone());
        self.emit(WatchEventKind::Modified, &task);
    }

    pub(crate) fn update_progress(&mut self, id: TaskId, progress: Progress) {
        if let Some(rt) = self.tasks.get_mut(&id) {
            rt.task.progress = progress;
            let snapshot = rt.task.clone();
            self.emit(WatchEventKind::Modified, &snapshot);
        }
    }

    pub(crate) fn set_note(&mut self, id: TaskId, note: String) {
        if let Some(rt) = self.tasks.get_mut(&id) {
            rt.task.progress.note = note;
            let snapshot = rt.task.clone();
            self.emit(WatchEventKind::Modified, &snapshot);
        }
    }

    pub(crate) fn list_snapshot(&self, history_limit: usize) -> TaskListSnapshot {
        let mut active = Vec::with_capacity(self.queue_order.len() + self.running_order.len());
        for id in &self.queue_order {
            active.push(self.tasks[id].task.clone());
        }
        for id in &self.running_order {
            active.push(self.tasks[id].task.clone());
        }
        TaskListSnapshot {
            resource_version: self.resource_version,
            active,
            history: self.history.iter().take(history_limit).cloned().collect(),
        }
    }

    pub(crate) fn list_running(&self) -> Vec<Task> {
        self.running_order.iter().map(|id| self.tasks[id].task.clone()).collect()
    }

    pub(crate) fn list_history(&self, limit: usize) -> Vec<Task> {
        self.history.iter().take(limit).cloned().collect()
    }

    pub(crate) fn resource_version(&self) -> u64 {
        self.resource_version
    }

    pub(crate) fn subscribe(&mut self) -> (u64, mpsc::Receiver<TaskSnapshot>) {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let id = self.alloc_sub_id();
        self.snapshot_subs.insert(id, tx);
        (id, rx)
    }

    pub(crate) fn unsubscribe_snapshot(&mut self, id: u64) {
        self.snapshot_subs.remove(&id);
    }

    pub(crate) fn unsubscribe_watch(&mut self, id: u64) {
        self.watch_subs.remove(&id);
    }

    /// `sinceRV = 0` always succeeds and subscribes from now. `sinceRV > 0`
    /// succeeds only while the ring still covers `sinceRV`; on success,
    /// buffered events with `rv > sinceRV` are replayed before the
    /// subscriber is registered for live events (both happen under this
    /// single lock acquisition, so no event can slip through the gap).
    pub(crate) fn subscribe_watch(
        &mut self,
        since_rv: u64,
    ) -> (u64, Option<mpsc::Receiver<TaskWatchEvent>>, bool) {
        if since_rv == 0 {
            let (tx, rx) = mpsc::channel(WATCH_BUFFER);
            let id = self.alloc_sub_id();
            self.watch_subs.insert(id, tx);
            return (id, Some(rx), true);
        }

        let oldest = self.ring.front().map(|(rv, _)| *rv);
        let covered = matches!(oldest, Some(o) if since_rv + 1 >= o);
        if !covered {
            return (0, None, false);
        }

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        for (rv, ev) in self.ring.iter() {
            if *rv > since_rv {
                let _ = tx.try_send(ev.clone());
            }
        }
        let id = self.alloc_sub_id();
        self.watch_subs.insert(id, tx);
        (id, Some(rx), true)
    }

    fn alloc_sub_id(&mut self) -> u64 {
        self.next_sub_id += 1;
        self.next_sub_id
    }

    fn push_history(&mut self, task: Task) {
        self.history.push_front(task);
        while self.history.len() > self.max_history {
            self.history.pop_back();
        }
    }

    fn emit(&mut self, kind: WatchEventKind, task: &Task) -> u64 {
        self.resource_version += 1;
        let rv = self.resource_version;
        let ev = TaskWatchEvent {
            kind,
            resource_version: rv,
            task: task.clone(),
        };
        self.ring.push_back((rv, ev.clone()));
        while self.ring.len() > self.max_events {
            self.ring.pop_front();
        }
        self.snapshot_subs.retain(|_, tx| match tx.try_send(task.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        self.watch_subs.retain(|_, tx| match tx.try_send(ev.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        rv
    }
}
