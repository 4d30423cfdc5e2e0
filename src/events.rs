//! Live event fan-out for dashboards and observers
//!
//! Events are published on a tokio broadcast channel. Every subscriber gets
//! its own cursor, so per-subscriber order always matches publish order and a
//! lagging subscriber only loses its own backlog. Publishing never fails:
//! having no subscribers is the normal idle state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::{
    alerts::AlertKey,
    notify::channel::ChannelKind,
    storage::schema::ReadingRow,
    thresholds::AlertCause,
};

/// Default number of events a subscriber may fall behind
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Outcome of one channel for one escalation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    Sent { recipients: usize },
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// A reading was ingested
    SensorUpdate { record: ReadingRow },

    /// First anomalous reading of a new occurrence
    AlertDetected {
        key: AlertKey,
        started_at: DateTime<Utc>,
    },

    /// Still inside the delay window
    AlertPending {
        key: AlertKey,
        elapsed_secs: f64,
        remaining_secs: f64,
    },

    /// Delay window exhausted, notification dispatched
    AlertEscalated {
        key: AlertKey,
        elapsed_secs: f64,
        record_id: Option<i64>,
    },

    /// Still active, notification already dispatched for this occurrence
    AlertOngoing { key: AlertKey, elapsed_secs: f64 },

    AlertCleared { key: AlertKey },

    AlertsReset { cleared: usize },

    NotificationResult {
        channel: ChannelKind,
        device_id: String,
        cause: AlertCause,
        record_id: Option<i64>,
        outcome: DeliveryOutcome,
    },
}

/// Cloneable handle to the event stream
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Best-effort fan-out to all current subscribers.
    pub fn publish(&self, event: Event) {
        match self.sender.send(event) {
            Ok(receivers) => trace!("event published to {receivers} subscribers"),
            Err(_) => trace!("event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
