//! SQLite storage backend
//!
//! Embedded database in WAL mode with a small connection pool. The schema is
//! applied through `sqlx` migrations on startup.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{DeliveryStatus, NotificationLogRow, ReadingRow};
use crate::{notify::channel::ChannelKind, sensors::SensorSource, thresholds::AlertCause};

pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database and run pending migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn parse_column<T>(row: &SqliteRow, column: &str) -> StorageResult<T>
    where
        T: FromStr<Err = String>,
    {
        let raw: String = row.try_get(column)?;
        raw.parse()
            .map_err(|e| StorageError::CorruptRow(format!("{column}: {e}")))
    }

    fn parse_optional_column<T>(row: &SqliteRow, column: &str) -> StorageResult<Option<T>>
    where
        T: FromStr<Err = String>,
    {
        let raw: Option<String> = row.try_get(column)?;
        raw.map(|value| value.parse())
            .transpose()
            .map_err(|e| StorageError::CorruptRow(format!("{column}: {e}")))
    }

    fn reading_from_row(row: &SqliteRow) -> StorageResult<ReadingRow> {
        Ok(ReadingRow {
            id: Some(row.try_get("id")?),
            device_id: row.try_get("device_id")?,
            location: row.try_get("location")?,
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
            temperature: row.try_get("temperature")?,
            humidity: row.try_get("humidity")?,
            ldr_value: row.try_get("ldr_value")?,
            primary_temperature: row.try_get("primary_temperature")?,
            backup_temperature: row.try_get("backup_temperature")?,
            source: Self::parse_column::<SensorSource>(row, "temperature_source")?,
            primary_ok: row.try_get("primary_ok")?,
            backup_ok: row.try_get("backup_ok")?,
            disagreement: row.try_get("sensor_disagreement")?,
            alert: row.try_get("alert")?,
            alert_cause: Self::parse_optional_column::<AlertCause>(row, "alert_cause")?,
        })
    }

    fn log_from_row(row: &SqliteRow) -> StorageResult<NotificationLogRow> {
        Ok(NotificationLogRow {
            id: Some(row.try_get("id")?),
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?),
            channel: Self::parse_column::<ChannelKind>(row, "channel")?,
            recipient: row.try_get("recipient")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            status: Self::parse_column::<DeliveryStatus>(row, "status")?,
            error: row.try_get("error")?,
            record_id: row.try_get("record_id")?,
            cause: Self::parse_optional_column::<AlertCause>(row, "alert_cause")?,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip_all, fields(device_id = %reading.device_id))]
    async fn insert_reading(&self, reading: ReadingRow) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sensor_records (
                device_id, location, timestamp, temperature, humidity, ldr_value,
                primary_temperature, backup_temperature, temperature_source,
                primary_ok, backup_ok, sensor_disagreement, alert, alert_cause
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reading.device_id)
        .bind(&reading.location)
        .bind(reading.timestamp.timestamp_millis())
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.ldr_value)
        .bind(reading.primary_temperature)
        .bind(reading.backup_temperature)
        .bind(reading.source.as_str())
        .bind(reading.primary_ok)
        .bind(reading.backup_ok)
        .bind(reading.disagreement)
        .bind(reading.alert)
        .bind(reading.alert_cause.map(|cause| cause.as_str()))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("stored reading {id}");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn query_readings(&self, limit: usize, offset: usize) -> StorageResult<Vec<ReadingRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, device_id, location, timestamp, temperature, humidity, ldr_value,
                   primary_temperature, backup_temperature, temperature_source,
                   primary_ok, backup_ok, sensor_disagreement, alert, alert_cause
            FROM sensor_records
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::reading_from_row).collect()
    }

    #[instrument(skip(self, logs), fields(count = logs.len()))]
    async fn insert_notification_logs(&self, logs: Vec<NotificationLogRow>) -> StorageResult<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for log in logs {
            sqlx::query(
                r#"
                INSERT INTO notification_log (
                    timestamp, channel, recipient, subject, body,
                    status, error, record_id, alert_cause
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(log.timestamp.timestamp_millis())
            .bind(log.channel.as_str())
            .bind(&log.recipient)
            .bind(&log.subject)
            .bind(&log.body)
            .bind(log.status.as_str())
            .bind(&log.error)
            .bind(log.record_id)
            .bind(log.cause.map(|cause| cause.as_str()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query_notification_logs(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<NotificationLogRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, channel, recipient, subject, body,
                   status, error, record_id, alert_cause
            FROM notification_log
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::log_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite backend operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
