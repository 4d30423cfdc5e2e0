//! API shared state

use std::sync::Arc;

use crate::{
    alerts::AlertEngine, config::SettingsStore, events::EventBroadcaster, ingest::Ingestor,
    notify::{ChannelSet, DispatcherHandle}, storage::StorageBackend,
};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ingestor: Arc<Ingestor>,

    /// Alert status and reset
    pub engine: Arc<AlertEngine>,

    /// Runtime-adjustable thresholds and recipients
    pub settings: Arc<SettingsStore>,

    pub storage: Arc<dyn StorageBackend>,

    pub dispatcher: DispatcherHandle,

    /// Used directly for operator test alerts, bypassing the alert lifecycle
    pub channels: ChannelSet,

    /// Source of the WebSocket event stream
    pub events: EventBroadcaster,
}
