use axum::{routing::get, Router};
use cronward_core::config::CronwardConfig;
use cronward_scheduler::{JobControl, SchedulerEngine};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

/// Shared daemon state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: CronwardConfig,
    pub control: JobControl,
    pub engine: SchedulerEngine,
    /// Open control connections, reported by `/health`.
    pub connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: CronwardConfig, control: JobControl, engine: SchedulerEngine) -> Self {
        Self {
            config,
            control,
            engine,
            connections: AtomicUsize::new(0),
        }
    }
}

/// Assemble the Axum router: health probe plus the control endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    let rpc_path = state.config.gateway.path.clone();
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(&rpc_path, get(crate::ws::connection::ws_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
