use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::control::{ControlSnapshot, ControlState};

#[derive(Clone)]
pub struct AppState {
    control: Arc<ControlState>,
}

impl AppState {
    pub fn new(control: Arc<ControlState>) -> Self {
        Self { control }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/control", get(get_status))
        .route("/control/drop-rate", post(set_drop_rate))
        .route("/control/enable", post(enable_emitter))
        .route("/control/disable", post(disable_emitter))
        .route("/control/reset-active-calls", post(reset_active_calls))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> Json<ControlSnapshot> {
    Json(state.control.snapshot())
}

async fn set_drop_rate(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<String, (StatusCode, String)> {
    let raw = q.get("value").cloned().unwrap_or_default();
    let value: f64 = raw.trim().parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid drop rate '{raw}'"),
        )
    })?;
    state.control.set_drop_rate(value);
    tracing::info!(target: "control", drop_rate = value, "drop rate updated");
    Ok(format!("Drop rate set to {value}"))
}

async fn enable_emitter(State(state): State<AppState>) -> String {
    state.control.set_emitter_enabled(true);
    tracing::info!(target: "control", "emitter enabled");
    "Emitter enabled".to_string()
}

async fn disable_emitter(State(state): State<AppState>) -> String {
    state.control.set_emitter_enabled(false);
    tracing::info!(target: "control", "emitter disabled");
    "Emitter disabled".to_string()
}

async fn reset_active_calls(State(state): State<AppState>) -> String {
    state.control.reset_active_calls();
    tracing::info!(target: "control", "active call counter reset");
    "Active calls reset".to_string()
}
