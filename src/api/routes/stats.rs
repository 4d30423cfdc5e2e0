//! Hub statistics endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::StatsResponse};

/// GET /stats
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let notifications = state.dispatcher.stats().await?;

    Ok(Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        active_alerts: state.engine.snapshot_status().len(),
        event_subscribers: state.events.subscriber_count(),
        notifications,
    }))
}
