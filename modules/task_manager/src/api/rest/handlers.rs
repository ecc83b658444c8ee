use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use futures::Stream;
use modkit::api::problem::{self, ProblemResponse};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::rest::dto::{
    CreateTaskReq, ListHistoryQuery, ListSnapshotQuery, TaskDto, TaskListSnapshotDto, TaskWatchEventDto,
    WatchExpiredDto, WatchQuery,
};
use crate::contract::error::TasksError;
use crate::domain::{runner_for_type, TaskService, WatchSubscription};

pub async fn create_task(
    Extension(service): Extension<Arc<TaskService>>,
    Json(req): Json<CreateTaskReq>,
) -> Result<(StatusCode, Json<TaskDto>), ProblemResponse> {
    let runner = runner_for_type(&req.task_type)
        .ok_or_else(|| problem::bad_request(format!("unknown task type: {}", req.task_type)))?;
    let meta = req.meta.unwrap_or(serde_json::Value::Null);
    let task = service.enqueue(req.task_type, req.title, meta, runner);
    info!(task_id = %task.id, "task enqueued via REST");
    Ok((StatusCode::CREATED, Json(task.into())))
}

pub async fn list_snapshot(
    Extension(service): Extension<Arc<TaskService>>,
    Query(query): Query<ListSnapshotQuery>,
) -> Json<TaskListSnapshotDto> {
    let snapshot = service.list_snapshot(query.history_limit.unwrap_or(0));
    Json(snapshot.into())
}

pub async fn list_running(Extension(service): Extension<Arc<TaskService>>) -> Json<Vec<TaskDto>> {
    let tasks = service.list_running();
    Json(tasks.into_iter().map(TaskDto::from).collect())
}

pub async fn list_history(
    Extension(service): Extension<Arc<TaskService>>,
    Query(query): Query<ListHistoryQuery>,
) -> Json<Vec<TaskDto>> {
    let tasks = service.list_history(query.limit.unwrap_or(0));
    Json(tasks.into_iter().map(TaskDto::from).collect())
}

pub async fn cancel_task(
    Extension(service): Extension<Arc<TaskService>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProblemResponse> {
    service.cancel(id).map_err(TasksError::from).map_err(map_tasks_error)?;
    debug!(task_id = %id, "task cancel requested via REST");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /tasks/watch?since_rv=` — Server-Sent Events framing of
/// `SubscribeWatch`. On expiry, emits one named `expired` event carrying
/// the current resource version and closes the stream.
pub async fn watch_tasks(
    Extension(service): Extension<Arc<TaskService>>,
    Query(query): Query<WatchQuery>,
) -> impl IntoResponse {
    let since_rv = query.since_rv.unwrap_or(0);
    match service.subscribe_watch(since_rv) {
        WatchSubscription::Active { events, guard } => {
            let stream = watch_stream(events, guard);
            Sse::new(stream)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
                .into_response()
        }
        WatchSubscription::Expired { current_resource_version } => {
            warn!(since_rv, current_resource_version, "watch subscription expired");
            let expired = WatchExpiredDto {
                resource_version: current_resource_version,
            };
            let event = Event::default().event("expired").json_data(&expired).unwrap_or_else(|_| {
                Event::default().event("expired").data("serialization_error")
            });
            let stream = futures::stream::once(async move { Ok::<_, Infallible>(event) });
            Sse::new(stream).into_response()
        }
    }
}

/// Folds the receiver and its subscription guard into the stream's own
/// state so the subscriber slot is freed the moment the client disconnects
/// and this stream is dropped — no separate task or drop glue needed.
fn watch_stream(
    events: tokio::sync::mpsc::Receiver<crate::domain::TaskWatchEvent>,
    guard: crate::domain::SubscriptionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((events, guard), |(mut rx, guard)| async move {
        let ev = rx.recv().await?;
        let dto = TaskWatchEventDto::from(ev);
        let rendered = Event::default()
            .json_data(&dto)
            .unwrap_or_else(|_| Event::default().data("serialization_error"));
        Some((Ok(rendered), (rx, guard)))
    })
}

fn map_tasks_error(err: TasksError) -> ProblemResponse {
    match err {
        TasksError::NotFound { id } => problem::not_found(format!("task not found: {id}")),
        TasksError::UnknownTaskType { task_type } => {
            problem::bad_request(format!("unknown task type: {task_type}"))
        }
        TasksError::Internal => problem::internal_error("internal error"),
    }
}
