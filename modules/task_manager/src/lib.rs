//! In-process task scheduler with list-watch semantics: queueing, a
//! worker-capped dispatcher, cancellation, and two subscription surfaces
//! (a lossy snapshot feed and a resumable list-watch) over a bounded event
//! history.

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;
pub mod gateways;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use std::sync::Arc;
use tracing::info;

use config::TaskManagerConfig;
use contract::TasksApi;
use domain::TaskService;
use gateways::TasksLocalClient;
use modkit::api::OpenApiRegistry;
use modkit::context::ModuleCtx;
use modkit::contracts::{Module, RestfulModule};

/// The `task_manager` module. Holds no state of its own before `init`;
/// the service is constructed once config is available and stashed in an
/// `ArcSwapOption` so `register_rest` (which runs after `init`, per the
/// registry's phase ordering) can read it out.
#[modkit::module(name = "task_manager", caps = [rest], deps = ["api_ingress"])]
pub struct TaskManagerModule {
    service: ArcSwapOption<TaskService>,
}

impl Default for TaskManagerModule {
    fn default() -> Self {
        Self {
            service: ArcSwapOption::empty(),
        }
    }
}

impl TaskManagerModule {
    fn service(&self) -> anyhow::Result<Arc<TaskService>> {
        self.service
            .load_full()
            .context("task_manager: init() has not run yet")
    }
}

#[async_trait]
impl Module for TaskManagerModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let config: TaskManagerConfig = ctx.config().unwrap_or_default();
        info!(
            max_workers = config.max_workers,
            max_history = config.max_history,
            max_events = config.max_events,
            "initializing task_manager"
        );
        let service = TaskService::new(config);

        let client: Arc<dyn TasksApi> = Arc::new(TasksLocalClient::new(Arc::clone(&service)));
        ctx.client_hub().register::<dyn TasksApi>(client);

        self.service.store(Some(service));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl RestfulModule for TaskManagerModule {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router> {
        let service = self.service()?;
        api::rest::register_routes(router, openapi, service)
    }
}
