use axum::{Extension, Router};
use modkit::api::{Missing, OpenApiRegistry, OperationBuilder};
use std::sync::Arc;

use crate::api::rest::{dto, handlers};
use crate::domain::TaskService;

pub fn register_routes(
    mut router: Router,
    openapi: &dyn OpenApiRegistry,
    service: Arc<TaskService>,
) -> anyhow::Result<Router> {
    router = OperationBuilder::<Missing, Missing, ()>::post("/tasks")
        .operation_id("task_manager.create_task")
        .summary("Enqueue a task")
        .description("Enqueue a new task of the given type; the runner is chosen server-side by type")
        .tag("tasks")
        .json_request::<dto::CreateTaskReq>(openapi, "Task to enqueue")
        .handler(handlers::create_task)
        .json_response_with_schema::<dto::TaskDto>(openapi, 201, "Task created")
        .problem_response(openapi, 400, "Unknown task type")
        .register(router, openapi);

    router = OperationBuilder::<Missing, Missing, ()>::get("/tasks")
        .operation_id("task_manager.list_snapshot")
        .summary("List a consistent task snapshot")
        .description("Returns the current resource version plus active and recent history tasks")
        .tag("tasks")
        .query_param("history_limit", false, "Maximum history entries to return (default 50)")
        .handler(handlers::list_snapshot)
        .json_response_with_schema::<dto::TaskListSnapshotDto>(openapi, 200, "Task snapshot")
        .register(router, openapi);

    router = OperationBuilder::<Missing, Missing, ()>::get("/tasks/running")
        .operation_id("task_manager.list_running")
        .summary("List running tasks")
        .tag("tasks")
        .handler(handlers::list_running)
        .json_response_with_schema::<dto::TaskDto>(openapi, 200, "Running tasks")
        .register(router, openapi);

    router = OperationBuilder::<Missing, Missing, ()>::get("/tasks/history")
        .operation_id("task_manager.list_history")
        .summary("List recent terminal tasks")
        .tag("tasks")
        .query_param("limit", false, "Maximum entries to return (default 50)")
        .handler(handlers::list_history)
        .json_response_with_schema::<dto::TaskDto>(openapi, 200, "Historical tasks")
        .register(router, openapi);

    router = OperationBuilder::<Missing, Missing, ()>::post("/tasks/{id}/cancel")
        .operation_id("task_manager.cancel_task")
        .summary("Cancel a task")
        .description("Cancels a queued or running task; terminal tasks return 404")
        .tag("tasks")
        .path_param("id", "Task id")
        .handler(handlers::cancel_task)
        .json_response(204, "Task cancellation accepted")
        .problem_response(openapi, 404, "Task not found")
        .register(router, openapi);

    router = OperationBuilder::<Missing, Missing, ()>::get("/tasks/watch")
        .operation_id("task_manager.watch_tasks")
        .summary("Subscribe to the task watch stream")
        .description(
            "Server-Sent Events stream of TaskWatchEvent frames; on ring eviction emits a \
             single named `expired` event and closes, expecting the client to re-list and resubscribe",
        )
        .tag("tasks")
        .query_param("since_rv", false, "Resume from this resource version (0 = now)")
        .handler(handlers::watch_tasks)
        .sse_json::<dto::TaskWatchEventDto>(openapi, "Task watch events")
        .register(router, openapi);

    router = router.layer(Extension(service));

    Ok(router)
}
