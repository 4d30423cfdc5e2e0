//! Alert status endpoints

use axum::{Json, extract::State};
use tracing::info;

use crate::api::{
    state::ApiState,
    types::{AlertListResponse, ResetResponse},
};

/// GET /alerts/status
///
/// Every alert that is currently active, notified or not
pub async fn alert_status(State(state): State<ApiState>) -> Json<AlertListResponse> {
    Json(state.engine.snapshot_status().into())
}

/// POST /alerts/reset
pub async fn reset_alerts(State(state): State<ApiState>) -> Json<ResetResponse> {
    let cleared = state.engine.reset_all();
    info!("alerts reset through the API");

    Json(ResetResponse {
        success: true,
        message: "All alerts have been reset".to_string(),
        cleared,
    })
}
