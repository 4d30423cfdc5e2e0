//! Storage backend trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use super::schema::{NotificationLogRow, ReadingRow};

/// Health status of the storage backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Persistence for readings and the notification audit trail
///
/// Implementations must be `Send + Sync` as they are shared between the
/// ingestion pipeline, the notification dispatcher and the API.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist one reading and return its assigned id.
    async fn insert_reading(&self, reading: ReadingRow) -> StorageResult<i64>;

    /// Readings newest first, skipping the `offset` most recent ones.
    async fn query_readings(&self, limit: usize, offset: usize) -> StorageResult<Vec<ReadingRow>>;

    /// The `limit` most recent readings, newest first.
    async fn query_latest_readings(&self, limit: usize) -> StorageResult<Vec<ReadingRow>> {
        self.query_readings(limit, 0).await
    }

    /// Append audit rows. Rows are never updated afterwards.
    async fn insert_notification_logs(&self, logs: Vec<NotificationLogRow>) -> StorageResult<()>;

    /// Audit rows, newest first.
    async fn query_notification_logs(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<NotificationLogRow>>;

    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
