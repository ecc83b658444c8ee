//! End-to-end REST tests driven through the router, the same style as
//! `api_ingress`'s own `tests/integration_router.rs`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use modkit::contracts::{Module, RestfulModule};
use modkit::context::ModuleCtxBuilder;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use task_manager::TaskManagerModule;

async fn build_router() -> (Router, TaskManagerModule) {
    let module = TaskManagerModule::default();
    let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();
    module.init(&ctx).await.expect("module init");

    let mut registry = api_ingress::ApiIngress::default();
    let router = module
        .register_rest(&ctx, Router::new(), &mut registry)
        .expect("register_rest");
    (router, module)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn enqueue_then_list_snapshot() {
    let (router, _module) = build_router().await;

    let create = Request::builder()
        .method("POST")
        .uri("/tasks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "type": "sleep", "title": "demo", "meta": null }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["status"], "queued");
    assert_eq!(created["type"], "sleep");

    let list = Request::builder().uri("/tasks").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = json_body(response).await;
    assert!(snapshot["resource_version"].as_u64().unwrap() >= 1);
    assert_eq!(snapshot["active"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_task_type_is_bad_request() {
    let (router, _module) = build_router().await;

    let create = Request::builder()
        .method("POST")
        .uri("/tasks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "type": "nonexistent", "title": "demo" }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_unknown_task_is_not_found() {
    let (router, _module) = build_router().await;

    let cancel = Request::builder()
        .method("POST")
        .uri(format!("/tasks/{}/cancel", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(cancel).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_queued_task_moves_it_to_history() {
    let (router, _module) = build_router().await;

    let create = Request::builder()
        .method("POST")
        .uri("/tasks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "type": "sleep", "title": "demo" }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Immediately race the dispatcher: either queued or already running —
    // either way cancel must succeed and the task must end up in history.
    let cancel = Request::builder()
        .method("POST")
        .uri(format!("/tasks/{id}/cancel"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(cancel).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let history = Request::builder()
        .uri("/tasks/history")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(history).await.unwrap();
    let history = json_body(response).await;
    let found = history
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"] == id && t["status"] == "canceled");
    assert!(found, "canceled task should appear in history: {history:?}");
}
