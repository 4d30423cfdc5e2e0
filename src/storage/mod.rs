//! Persistence for readings and the notification audit trail
//!
//! `StorageBackend` is the seam; the hub picks an implementation from its
//! configuration:
//!
//! - **SQLite** (default): embedded database
//! - **In-Memory**: no persistence, for tests or ephemeral runs

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{DeliveryStatus, NotificationLogRow, ReadingRow};
