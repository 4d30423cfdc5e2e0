//! Runtime settings endpoints

use axum::{Json, extract::State};
use tracing::info;

use crate::{
    api::{
        error::ApiResult,
        state::ApiState,
        types::{MaxThresholdResponse, MinThresholdResponse, ThresholdResponse, ThresholdUpdate},
    },
    config::{ConfigProvider, Settings, SettingsUpdate},
};

/// GET /settings
pub async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.settings.settings()?))
}

/// POST /settings
///
/// Partial update, absent fields keep their current value
pub async fn update_settings(
    State(state): State<ApiState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
    let settings = state.settings.update(update)?;
    info!(
        "settings updated: thresholds {:.1}°C..{:.1}°C",
        settings.alerts.min_threshold, settings.alerts.max_threshold
    );
    Ok(Json(settings))
}

/// GET /config/threshold
///
/// Polled by devices that alarm locally
pub async fn get_max_threshold(
    State(state): State<ApiState>,
) -> ApiResult<Json<MaxThresholdResponse>> {
    let settings = state.settings.settings()?;
    Ok(Json(MaxThresholdResponse {
        threshold: settings.alerts.max_threshold,
    }))
}

/// GET /config/min-threshold
pub async fn get_min_threshold(
    State(state): State<ApiState>,
) -> ApiResult<Json<MinThresholdResponse>> {
    let settings = state.settings.settings()?;
    Ok(Json(MinThresholdResponse {
        min_threshold: settings.alerts.min_threshold,
    }))
}

/// POST /config/thresholds
pub async fn update_thresholds(
    State(state): State<ApiState>,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<Json<ThresholdResponse>> {
    let settings = state.settings.update(SettingsUpdate {
        max_threshold: update.max_threshold,
        min_threshold: update.min_threshold,
        ..Default::default()
    })?;
    info!(
        "thresholds updated to {:.1}°C..{:.1}°C",
        settings.alerts.min_threshold, settings.alerts.max_threshold
    );

    Ok(Json(ThresholdResponse {
        success: true,
        max_threshold: settings.alerts.max_threshold,
        min_threshold: settings.alerts.min_threshold,
    }))
}
