//! Temperature alerting hub for IoT sensor devices.
//!
//! Devices post readings from a primary and a backup temperature sensor. The
//! hub reconciles both into one value, classifies it against the configured
//! thresholds and runs every out-of-range condition through a debounced alert
//! lifecycle. Conditions that outlast the delay window are escalated once to
//! email, SMS and chat, and every delivery attempt is written to an audit log.

pub mod alerts;
pub mod config;
pub mod events;
pub mod ingest;
pub mod notify;
pub mod sensors;
pub mod storage;
pub mod thresholds;
pub mod util;

#[cfg(feature = "api")]
pub mod api;
