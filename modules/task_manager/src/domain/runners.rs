//! Runner contract and the two demo runners reachable over REST.
//!
//! A runner is a boxed async closure: it receives a [`RunnerHandle`] it can
//! use to push progress and must watch for cancellation itself, returning
//! `Err(RunnerError::Canceled)` when it observes the token firing rather
//! than any other error — there is no sentinel to pattern-match on the way
//! a cancelled `context.Context` would be, so the runner reports it
//! explicitly instead.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::RunnerError;
use super::model::{Progress, TaskId};
use super::service::TaskService;

type BoxedRunnerFuture = Pin<Box<dyn Future<Output = Result<(), RunnerError>> + Send>>;

/// A runner factory: called once per task invocation with a fresh handle.
pub type Runner = Arc<dyn Fn(RunnerHandle) -> BoxedRunnerFuture + Send + Sync>;

/// Handed to a runner invocation. Lets it report progress/notes back into
/// the store and check (or wait on) its own cancellation.
pub struct RunnerHandle {
    id: TaskId,
    service: Arc<TaskService>,
    cancel: CancellationToken,
}

impl RunnerHandle {
    pub(crate) fn new(id: TaskId, service: Arc<TaskService>, cancel: CancellationToken) -> Self {
        Self { id, service, cancel }
    }

    pub fn task_id(&self) -> TaskId {
        self.id
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn update(&self, progress: Progress) {
        self.service.report_progress(self.id, progress);
    }

    pub fn set_note(&self, note: impl Into<String>) {
        self.service.report_note(self.id, note.into());
    }
}

/// `"sleep"`: ticks `steps` times, sleeping `per_tick` between each and
/// reporting progress as it goes. Exits early with `Canceled` the moment
/// its token fires, matching the spec's cancel-while-running scenario.
pub fn sleep_runner(steps: i64, per_tick: Duration) -> Runner {
    Arc::new(move |handle: RunnerHandle| {
        Box::pin(async move {
            for done in 1..=steps {
                tokio::select! {
                    _ = tokio::time::sleep(per_tick) => {}
                    _ = handle.cancellation_token().cancelled() => {
                        return Err(RunnerError::Canceled);
                    }
                }
                handle.update(Progress {
                    total: steps,
                    done,
                    unit: "steps".to_string(),
                    note: String::new(),
                });
            }
            Ok(())
        })
    })
}

/// `"fail"`: waits briefly, then always fails with a fixed message. Used to
/// exercise the failure-recording path over REST without a real workload.
pub fn fail_runner(message: impl Into<String>, delay: Duration) -> Runner {
    let message = message.into();
    Arc::new(move |handle: RunnerHandle| {
        let message = message.clone();
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = handle.cancellation_token().cancelled() => {
                    return Err(RunnerError::Canceled);
                }
            }
            Err(RunnerError::failed(message))
        })
    })
}

/// Resolves a REST-supplied `type` string to a demo runner. `None` means
/// the caller asked for a task type this build doesn't know how to run.
pub fn runner_for_type(task_type: &str) -> Option<Runner> {
    match task_type {
        "sleep" => Some(sleep_runner(100, Duration::from_millis(20))),
        "fail" => Some(fail_runner("simulated failure", Duration::from_millis(50))),
        _ => None,
    }
}
