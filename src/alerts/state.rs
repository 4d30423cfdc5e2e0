//! Per-condition alert state
//!
//! The map itself sits behind an `RwLock` that is only write-locked to insert
//! a new key or to reset everything. Every record has its own `Mutex`, so
//! readings for unrelated devices or causes never wait on each other while the
//! read-decide-write on a single key stays one critical section.
//!
//! Cleared records are dropped from the map so that one-off device ids do not
//! accumulate. A dropped record is marked retired first; an observer that
//! fetched it just before the removal retries against the map.
//!
//! No lock in this module is ever held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::thresholds::AlertCause;

/// Identity of one tracked condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlertKey {
    pub device_id: String,
    pub cause: AlertCause,
}

impl AlertKey {
    pub fn new(device_id: impl Into<String>, cause: AlertCause) -> Self {
        Self {
            device_id: device_id.into(),
            cause,
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.device_id, self.cause)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Activation {
    since: Instant,
    started_at: DateTime<Utc>,
}

/// Debounce state of one [`AlertKey`].
///
/// `notified` can only be set while the record is active, and both fields are
/// cleared together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertRecord {
    active: Option<Activation>,
    notified: bool,
    retired: bool,
}

impl AlertRecord {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn notified(&self) -> bool {
        self.notified
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.map(|a| a.started_at)
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.active.map(|a| now.saturating_duration_since(a.since))
    }

    fn activate(&mut self, now: Instant, wall: DateTime<Utc>) {
        self.active = Some(Activation {
            since: now,
            started_at: wall,
        });
        self.notified = false;
    }

    fn clear(&mut self) -> bool {
        let was_active = self.active.is_some();
        self.active = None;
        self.notified = false;
        was_active
    }
}

/// What one anomalous reading did to its record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// First anomalous reading, the delay window starts now
    Detected { started_at: DateTime<Utc> },
    /// Still inside the delay window
    Pending { elapsed: Duration, remaining: Duration },
    /// The delay window is exhausted and nobody has been notified yet.
    /// Exactly one caller observes this per occurrence.
    Escalated { elapsed: Duration },
    /// Active and already notified
    Ongoing { elapsed: Duration },
}

/// Read-only view of an active record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStatus {
    pub is_active: bool,
    pub elapsed_seconds: f64,
    pub notified: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct AlertStateStore {
    records: RwLock<HashMap<AlertKey, Arc<Mutex<AlertRecord>>>>,
}

impl AlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, key: &AlertKey) -> Option<Arc<Mutex<AlertRecord>>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn slot(&self, key: &AlertKey) -> Arc<Mutex<AlertRecord>> {
        if let Some(slot) = self.existing(key) {
            return slot;
        }

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Advance the record of `key` for one anomalous reading observed at `now`.
    pub(crate) fn observe(
        &self,
        key: &AlertKey,
        delay_window: Duration,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Transition {
        loop {
            let slot = self.slot(key);
            let mut record = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if record.retired {
                continue;
            }

            let Some(elapsed) = record.elapsed(now) else {
                record.activate(now, wall);
                return Transition::Detected { started_at: wall };
            };

            return if record.notified {
                Transition::Ongoing { elapsed }
            } else if elapsed >= delay_window {
                record.notified = true;
                Transition::Escalated { elapsed }
            } else {
                Transition::Pending {
                    elapsed,
                    remaining: delay_window - elapsed,
                }
            };
        }
    }

    /// Clear every active record of `device_id` and return the keys that
    /// actually changed. Cleared records leave the map.
    pub(crate) fn clear_device(&self, device_id: &str) -> Vec<AlertKey> {
        let keys: Vec<_> = AlertCause::ALL
            .into_iter()
            .map(|cause| AlertKey::new(device_id, cause))
            .filter(|key| self.existing(key).is_some())
            .collect();
        if keys.is_empty() {
            return keys;
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        keys.into_iter()
            .filter(|key| {
                let Some(slot) = records.get(key).cloned() else {
                    return false;
                };
                let mut record = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let was_active = record.clear();
                record.retired = true;
                drop(record);
                records.remove(key);
                was_active
            })
            .collect()
    }

    /// Forget every record. Returns how many were active.
    pub(crate) fn reset_all(&self) -> usize {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let cleared = records
            .values()
            .filter(|slot| {
                let mut record = slot.lock().unwrap_or_else(PoisonError::into_inner);
                record.retired = true;
                record.clear()
            })
            .count();
        records.clear();

        cleared
    }

    /// Number of records currently held, active or not
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &AlertKey) -> Option<AlertRecord> {
        self.existing(key)
            .map(|slot| *slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Status of every active record at `now`.
    pub fn snapshot(&self, now: Instant) -> BTreeMap<AlertKey, AlertStatus> {
        let slots: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();

        slots
            .into_iter()
            .filter_map(|(key, slot)| {
                let record = *slot.lock().unwrap_or_else(PoisonError::into_inner);
                let elapsed = record.elapsed(now)?;
                Some((
                    key,
                    AlertStatus {
                        is_active: true,
                        elapsed_seconds: elapsed.as_secs_f64(),
                        notified: record.notified,
                        started_at: record.started_at(),
                    },
                ))
            })
            .collect()
    }
}
