use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use super::state::{AlertKey, AlertStateStore, AlertStatus, Transition};
use crate::events::{Event, EventBroadcaster};
use crate::notify::{AlertContext, DispatcherHandle};
use crate::thresholds::{AlertCause, classify};

/// One reading as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: String,
    pub location: String,
    pub temperature: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// Id of the persisted reading, when it was stored
    pub record_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub is_active: bool,
    pub cause: Option<AlertCause>,
}

impl Evaluation {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            cause: None,
        }
    }

    pub fn active(cause: AlertCause) -> Self {
        Self {
            is_active: true,
            cause: Some(cause),
        }
    }
}

/// Debounced alert lifecycle.
///
/// A condition has to persist for the whole delay window before operators are
/// notified, and they are notified once per occurrence. The engine owns the
/// state store; nothing else mutates it.
pub struct AlertEngine {
    store: AlertStateStore,
    dispatcher: DispatcherHandle,
    events: EventBroadcaster,
}

impl AlertEngine {
    pub fn new(dispatcher: DispatcherHandle, events: EventBroadcaster) -> Self {
        Self {
            store: AlertStateStore::new(),
            dispatcher,
            events,
        }
    }

    /// Feed one reading through the lifecycle.
    ///
    /// Only waits for room in the notification queue, never for delivery.
    #[instrument(skip_all, fields(device_id = %reading.device_id, temperature = reading.temperature))]
    pub async fn evaluate(&self, reading: &Reading, delay_window: Duration) -> Evaluation {
        let Some(cause) = classify(
            reading.temperature,
            reading.min_threshold,
            reading.max_threshold,
        ) else {
            for key in self.store.clear_device(&reading.device_id) {
                info!("alert {key} cleared");
                self.events.publish(Event::AlertCleared { key });
            }
            return Evaluation::inactive();
        };

        let key = AlertKey::new(reading.device_id.clone(), cause);
        let transition = self
            .store
            .observe(&key, delay_window, Instant::now(), Utc::now());

        match transition {
            Transition::Detected { started_at } => {
                info!(
                    "alert {key} started, escalating in {}s",
                    delay_window.as_secs_f64()
                );
                self.events
                    .publish(Event::AlertDetected { key, started_at });
            }
            Transition::Pending { elapsed, remaining } => {
                debug!(
                    "alert {key} running for {:.1}s, {:.1}s until escalation",
                    elapsed.as_secs_f64(),
                    remaining.as_secs_f64()
                );
                self.events.publish(Event::AlertPending {
                    key,
                    elapsed_secs: elapsed.as_secs_f64(),
                    remaining_secs: remaining.as_secs_f64(),
                });
            }
            Transition::Escalated { elapsed } => {
                info!(
                    "alert {key} running for {:.1}s, notifying operators",
                    elapsed.as_secs_f64()
                );
                self.events.publish(Event::AlertEscalated {
                    key: key.clone(),
                    elapsed_secs: elapsed.as_secs_f64(),
                    record_id: reading.record_id,
                });
                self.escalate(&key, reading).await;
            }
            Transition::Ongoing { elapsed } => {
                debug!("alert {key} ongoing, operators already notified");
                self.events.publish(Event::AlertOngoing {
                    key,
                    elapsed_secs: elapsed.as_secs_f64(),
                });
            }
        }

        Evaluation::active(cause)
    }

    async fn escalate(&self, key: &AlertKey, reading: &Reading) {
        let context = AlertContext {
            device_id: reading.device_id.clone(),
            location: reading.location.clone(),
            cause: key.cause,
            temperature: reading.temperature,
            min_threshold: reading.min_threshold,
            max_threshold: reading.max_threshold,
            record_id: reading.record_id,
            escalated_at: Utc::now(),
        };

        // the record stays notified even if the queue is gone
        if let Err(e) = self.dispatcher.submit(context).await {
            error!("could not queue notifications for {key}: {e}");
        }
    }

    /// Every active alert with its age and notification state.
    pub fn snapshot_status(&self) -> BTreeMap<AlertKey, AlertStatus> {
        self.store.snapshot(Instant::now())
    }

    /// Forget all alert state. Safe to call repeatedly.
    pub fn reset_all(&self) -> usize {
        let cleared = self.store.reset_all();
        info!("alert state reset ({cleared} active alerts cleared)");
        self.events.publish(Event::AlertsReset { cleared });
        cleared
    }
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
