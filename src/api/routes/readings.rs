//! Sensor reading endpoints

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    api::{
        error::ApiResult,
        state::ApiState,
        types::{PageParams, StatusResponse},
    },
    config::ConfigProvider,
    ingest::{IngestOutcome, SensorPayload},
    storage::ReadingRow,
};

/// POST /sensor-data
///
/// Rejected with 400 only when neither sensor produced a usable value
pub async fn post_sensor_data(
    State(state): State<ApiState>,
    Json(payload): Json<SensorPayload>,
) -> ApiResult<Json<IngestOutcome>> {
    let outcome = state.ingestor.ingest(payload).await?;
    Ok(Json(outcome))
}

/// GET /readings/latest?limit=
pub async fn latest_readings(
    State(state): State<ApiState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<ReadingRow>>> {
    let readings = state.storage.query_latest_readings(page.limit()).await?;
    Ok(Json(readings))
}

/// GET /data/history?limit=&offset=
///
/// Newest first
pub async fn data_history(
    State(state): State<ApiState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<ReadingRow>>> {
    let readings = state
        .storage
        .query_readings(page.limit(), page.offset())
        .await?;

    Ok(Json(readings))
}

/// GET /status
///
/// Current thresholds and the most recent reading, if any
pub async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusResponse>> {
    let alerts = state.settings.settings()?.alerts;
    let latest_record = state
        .storage
        .query_latest_readings(1)
        .await?
        .into_iter()
        .next();

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        threshold: alerts.max_threshold,
        min_threshold: alerts.min_threshold,
        latest_record,
    }))
}
