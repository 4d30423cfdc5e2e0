//! In-memory storage backend (no persistence)
//!
//! Readings are kept in a ring buffer, the audit log is kept in full.
//! Useful for tests and for running the hub without a database.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;
use super::schema::{NotificationLogRow, ReadingRow};

/// Maximum readings to keep in memory
const MAX_READINGS: usize = 10_000;

#[derive(Debug, Default)]
struct Tables {
    readings: VecDeque<ReadingRow>,
    notification_log: Vec<NotificationLogRow>,
    next_reading_id: i64,
    next_log_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_reading(&self, mut reading: ReadingRow) -> StorageResult<i64> {
        let mut tables = self.tables.write().await;

        tables.next_reading_id += 1;
        let id = tables.next_reading_id;
        reading.id = Some(id);

        if tables.readings.len() == MAX_READINGS {
            tables.readings.pop_front();
        }
        tables.readings.push_back(reading);

        debug!("in-memory backend: stored reading {id}");
        Ok(id)
    }

    async fn query_readings(&self, limit: usize, offset: usize) -> StorageResult<Vec<ReadingRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_notification_logs(&self, logs: Vec<NotificationLogRow>) -> StorageResult<()> {
        let mut tables = self.tables.write().await;

        for mut log in logs {
            tables.next_log_id += 1;
            log.id = Some(tables.next_log_id);
            tables.notification_log.push(log);
        }

        Ok(())
    }

    async fn query_notification_logs(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<NotificationLogRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notification_log
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let tables = self.tables.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("readings".to_string(), tables.readings.len().to_string()),
                (
                    "notification_log".to_string(),
                    tables.notification_log.len().to_string(),
                ),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
