//! Reading ingestion
//!
//! One reading goes through, in order:
//!
//! 1. sensor reconciliation (the only step that can reject a reading)
//! 2. threshold lookup, falling back to the last good settings
//! 3. persistence, which assigns the record id
//! 4. exactly one pass through the alert engine
//! 5. a `sensor_update` event for live dashboards

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::alerts::{AlertEngine, Evaluation, Reading};
use crate::config::{AlertSettings, ConfigProvider};
use crate::events::{Event, EventBroadcaster};
use crate::sensors::{Reconciliation, SensorPair, SensorRangeError};
use crate::storage::{ReadingRow, StorageBackend};
use crate::thresholds::classify;

/// Telemetry as posted by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(default = "default_location")]
    pub location: String,

    /// Reading of the DS18B20 probe
    #[serde(default)]
    pub ds18b20_temp: Option<f64>,

    /// Older firmware name of `ds18b20_temp`
    #[serde(default)]
    pub ds18b20_temperature: Option<f64>,

    /// Reading of the DHT sensor
    #[serde(default)]
    pub dht_temp: Option<f64>,

    /// Older firmware name of `dht_temp`
    #[serde(default)]
    pub dht_temperature: Option<f64>,

    #[serde(default)]
    pub humidity: Option<f64>,

    #[serde(default)]
    pub ldr_value: Option<i64>,
}

impl SensorPayload {
    /// Primary probe value, the short field name wins when both are sent
    pub fn primary_temp(&self) -> Option<f64> {
        self.ds18b20_temp.or(self.ds18b20_temperature)
    }

    pub fn backup_temp(&self) -> Option<f64> {
        self.dht_temp.or(self.dht_temperature)
    }
}

fn default_device_id() -> String {
    String::from("ESP32_01")
}

fn default_location() -> String {
    String::from("Unknown")
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// The reading as stored, `id` is `None` if persistence failed
    pub record: ReadingRow,
    pub evaluation: Evaluation,
    pub reconciliation: Reconciliation,
}

pub struct Ingestor {
    config: Arc<dyn ConfigProvider>,
    storage: Arc<dyn StorageBackend>,
    engine: Arc<AlertEngine>,
    events: EventBroadcaster,
    last_known: Mutex<AlertSettings>,
}

impl Ingestor {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        storage: Arc<dyn StorageBackend>,
        engine: Arc<AlertEngine>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            config,
            storage,
            engine,
            events,
            last_known: Mutex::new(AlertSettings::default()),
        }
    }

    /// Current thresholds, or the last ones that could be read.
    fn alert_settings(&self) -> AlertSettings {
        match self.config.settings() {
            Ok(settings) => {
                *self.last_known.lock().unwrap_or_else(PoisonError::into_inner) =
                    settings.alerts.clone();
                settings.alerts
            }
            Err(e) => {
                warn!("{e}, using last known thresholds");
                self.last_known
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            }
        }
    }

    #[instrument(skip_all, fields(device_id = %payload.device_id))]
    pub async fn ingest(&self, payload: SensorPayload) -> Result<IngestOutcome, SensorRangeError> {
        let sensors = SensorPair::new(payload.primary_temp(), payload.backup_temp());
        let reconciliation = sensors.reconcile().inspect_err(|e| warn!("rejected reading: {e}"))?;

        let alerts = self.alert_settings();
        let cause = classify(
            reconciliation.temperature,
            alerts.min_threshold,
            alerts.max_threshold,
        );

        let mut record = ReadingRow::from_reconciliation(
            payload.device_id,
            payload.location,
            Utc::now(),
            sensors,
            &reconciliation,
        )
        .with_cause(cause);
        record.humidity = payload.humidity;
        record.ldr_value = payload.ldr_value;

        match self.storage.insert_reading(record.clone()).await {
            Ok(id) => record.id = Some(id),
            Err(e) => error!("failed to store reading: {e}"),
        }

        let reading = Reading {
            device_id: record.device_id.clone(),
            location: record.location.clone(),
            temperature: record.temperature,
            min_threshold: alerts.min_threshold,
            max_threshold: alerts.max_threshold,
            record_id: record.id,
        };
        let evaluation = self.engine.evaluate(&reading, alerts.delay_window()).await;

        self.events.publish(Event::SensorUpdate {
            record: record.clone(),
        });

        info!(
            "sensor data recorded: temp={:.1}°C ({}), alert={}",
            record.temperature, record.source, evaluation.is_active
        );

        Ok(IngestOutcome {
            record,
            evaluation,
            reconciliation,
        })
    }
}
