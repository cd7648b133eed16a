use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns daemon metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "scheduler_running": state.engine.is_running(),
        "jobs": state.control.store().len(),
        "connections": state.connections.load(Ordering::Relaxed),
    }))
}
