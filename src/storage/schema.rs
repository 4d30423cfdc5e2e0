//! Row definitions for the two persisted tables
//!
//! - `sensor_records`: one row per ingested reading, including the
//!   reconciliation details and whether the reading was anomalous
//! - `notification_log`: append-only audit trail, one row per recipient per
//!   channel per escalation

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    notify::channel::ChannelKind,
    sensors::{Reconciliation, SensorPair, SensorSource},
    thresholds::AlertCause,
};

/// One ingested reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    /// Assigned by the backend on insert
    pub id: Option<i64>,

    pub device_id: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,

    /// Canonical temperature after reconciliation (°C)
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub ldr_value: Option<i64>,

    // raw probe values as received
    pub primary_temperature: Option<f64>,
    pub backup_temperature: Option<f64>,

    pub source: SensorSource,
    pub primary_ok: bool,
    pub backup_ok: bool,
    pub disagreement: bool,

    /// The reading crossed a threshold when it was classified
    pub alert: bool,
    pub alert_cause: Option<AlertCause>,
}

impl ReadingRow {
    pub fn from_reconciliation(
        device_id: String,
        location: String,
        timestamp: DateTime<Utc>,
        sensors: SensorPair,
        reconciliation: &Reconciliation,
    ) -> Self {
        Self {
            id: None,
            device_id,
            location,
            timestamp,
            temperature: reconciliation.temperature,
            humidity: None,
            ldr_value: None,
            primary_temperature: sensors.primary,
            backup_temperature: sensors.backup,
            source: reconciliation.source,
            primary_ok: reconciliation.primary_ok,
            backup_ok: reconciliation.backup_ok,
            disagreement: reconciliation.disagreement,
            alert: false,
            alert_cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Option<AlertCause>) -> Self {
        self.alert = cause.is_some();
        self.alert_cause = cause;
        self
    }
}

/// Delivery status of one audited notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(DeliveryStatus::Sent),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// One audited delivery attempt to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogRow {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelKind,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,

    /// Reading that triggered the escalation
    pub record_id: Option<i64>,
    pub cause: Option<AlertCause>,
}
