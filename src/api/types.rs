//! API request and response types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertKey, AlertStatus};
use crate::notify::DispatcherStats;
use crate::storage::{HealthStatus, ReadingRow};

/// Upper bound for any list endpoint
pub const MAX_PAGE_SIZE: usize = 500;

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: HealthStatus,
}

/// One entry of `GET /alerts/status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEntry {
    /// `{device_id}_{cause}`
    pub alert_type: String,
    pub device_id: String,
    pub is_alert_active: bool,
    pub alert_start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub count: usize,
    pub alerts: Vec<AlertEntry>,
}

impl From<BTreeMap<AlertKey, AlertStatus>> for AlertListResponse {
    fn from(snapshot: BTreeMap<AlertKey, AlertStatus>) -> Self {
        let alerts: Vec<_> = snapshot
            .into_iter()
            .map(|(key, status)| AlertEntry {
                alert_type: key.to_string(),
                device_id: key.device_id,
                is_alert_active: status.is_active,
                alert_start_time: status.started_at,
                elapsed_seconds: status.elapsed_seconds,
                notified: status.notified,
            })
            .collect();

        Self {
            count: alerts.len(),
            alerts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub active_alerts: usize,
    pub event_subscribers: usize,
    pub notifications: DispatcherStats,
}

/// `GET /config/threshold`, polled by devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxThresholdResponse {
    pub threshold: f64,
}

/// `GET /config/min-threshold`, polled by devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinThresholdResponse {
    pub min_threshold: f64,
}

/// Body of `POST /config/thresholds`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdUpdate {
    pub max_threshold: Option<f64>,
    pub min_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdResponse {
    pub success: bool,
    pub max_threshold: f64,
    pub min_threshold: f64,
}

/// `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub threshold: f64,
    pub min_threshold: f64,
    pub latest_record: Option<ReadingRow>,
}

/// Optional body of `POST /send_email_alert`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestAlertRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAlertResponse {
    pub success: bool,
    pub message: String,
    pub recipients: usize,
}

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PageParams {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}
