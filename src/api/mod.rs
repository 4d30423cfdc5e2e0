//! REST API and WebSocket server of the hub
//!
//! ## Endpoints
//!
//! - `POST /sensor-data` - Ingest one device reading
//! - `GET /readings/latest` - Most recent stored readings
//! - `GET /data/history` - Stored readings, paged with `limit` and `offset`
//! - `GET /status` - Thresholds and the latest reading
//! - `GET /alerts/status` - Active alerts with age and notification state
//! - `POST /alerts/reset` - Forget all alert state
//! - `GET /notifications` - Notification audit log
//! - `POST /send_email_alert` - Send a test email to the configured recipients
//! - `GET /settings`, `POST /settings` - Runtime thresholds and recipients
//! - `GET /config/threshold`, `GET /config/min-threshold` - Current bounds for devices
//! - `POST /config/thresholds` - Update either bound
//! - `GET /health` - Health check
//! - `GET /stats` - Hub statistics
//! - `WS /ws/events` - Live lifecycle and reading events

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    AlertEntry, AlertListResponse, HealthResponse, PageParams, ResetResponse, StatsResponse,
};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;

/// Build the router with every route of the hub
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/sensor-data", post(routes::readings::post_sensor_data))
        .route("/readings/latest", get(routes::readings::latest_readings))
        .route("/data/history", get(routes::readings::data_history))
        .route("/status", get(routes::readings::status))
        .route("/alerts/status", get(routes::alerts::alert_status))
        .route("/alerts/reset", post(routes::alerts::reset_alerts))
        .route(
            "/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/settings",
            get(routes::settings::get_settings).post(routes::settings::update_settings),
        )
        .route("/config/threshold", get(routes::settings::get_max_threshold))
        .route(
            "/config/min-threshold",
            get(routes::settings::get_min_threshold),
        )
        .route(
            "/config/thresholds",
            post(routes::settings::update_thresholds),
        )
        .route(
            "/send_email_alert",
            post(routes::notifications::send_test_alert),
        )
        .route("/health", get(routes::health::health_check))
        .route("/stats", get(routes::stats::get_stats))
        .route("/ws/events", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(
    settings: &ApiSettings,
    state: ApiState,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", settings.bind_addr);

    let app = router(state, settings.enable_cors);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
