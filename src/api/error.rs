//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::config::ConfigError;
use crate::sensors::SensorRangeError;
use crate::storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Neither temperature sensor produced a usable value
    InvalidReading(String),

    /// Invalid request parameters
    InvalidRequest(String),

    StorageError(String),

    /// A collaborator is temporarily not available
    Unavailable(String),

    /// A notification provider failed or timed out
    DeliveryFailed(String),

    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidReading(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::StorageError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::DeliveryFailed(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<SensorRangeError> for ApiError {
    fn from(err: SensorRangeError) -> Self {
        ApiError::InvalidReading(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::StorageError(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(msg) => ApiError::InvalidRequest(msg),
            ConfigError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<crate::notify::DispatchError> for ApiError {
    fn from(err: crate::notify::DispatchError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

impl From<crate::notify::ChannelError> for ApiError {
    fn from(err: crate::notify::ChannelError) -> Self {
        ApiError::DeliveryFailed(err.to_string())
    }
}
