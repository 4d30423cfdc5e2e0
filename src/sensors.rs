//! Reconciliation of the redundant temperature probes
//!
//! Each device carries two independent temperature sensors. The primary
//! (a DS18B20 probe) has the wider physical range and is authoritative
//! whenever it is valid; the backup (the DHT sensor) only steps in when
//! the primary is missing or out of range.
//!
//! ```text
//! primary ok | backup ok | temperature | source  | disagreement
//! -----------+-----------+-------------+---------+------------------
//!    yes     |    yes    |  primary    | primary | |p - b| > 2.0
//!    yes     |    no     |  primary    | primary | false
//!    no      |    yes    |  backup     | backup  | false
//!    no      |    no     |  SensorRangeError
//! ```

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Physical range of the primary probe (°C)
pub const PRIMARY_RANGE: RangeInclusive<f64> = -40.0..=125.0;

/// Physical range of the backup sensor (°C)
pub const BACKUP_RANGE: RangeInclusive<f64> = -40.0..=80.0;

/// Maximum tolerated difference between the two sensors before the reading
/// is flagged (°C)
pub const DISAGREEMENT_TOLERANCE: f64 = 2.0;

/// Both sensor readings were missing or outside their physical range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("both temperature sensors are out of range (primary: {primary:?}, backup: {backup:?})")]
pub struct SensorRangeError {
    pub primary: Option<f64>,
    pub backup: Option<f64>,
}

/// Which sensor the canonical temperature was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    Primary,
    Backup,
}

impl SensorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorSource::Primary => "primary",
            SensorSource::Backup => "backup",
        }
    }
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(SensorSource::Primary),
            "backup" => Ok(SensorSource::Backup),
            other => Err(format!("unknown sensor source: {other}")),
        }
    }
}

/// Raw observations from the two probes of one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorPair {
    pub primary: Option<f64>,
    pub backup: Option<f64>,
}

impl SensorPair {
    pub fn new(primary: Option<f64>, backup: Option<f64>) -> Self {
        Self { primary, backup }
    }
}

/// Result of reconciling a [`SensorPair`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub temperature: f64,
    pub source: SensorSource,
    pub primary_ok: bool,
    pub backup_ok: bool,
    /// Informational only, never blocks the reading
    pub disagreement: bool,
}

fn within(value: Option<f64>, range: &RangeInclusive<f64>) -> Option<f64> {
    // NaN fails `contains`, infinities fall outside either range
    value.filter(|v| range.contains(v))
}

/// Resolve two redundant readings into one canonical temperature.
pub fn reconcile(primary: Option<f64>, backup: Option<f64>) -> Result<Reconciliation, SensorRangeError> {
    let valid_primary = within(primary, &PRIMARY_RANGE);
    let valid_backup = within(backup, &BACKUP_RANGE);

    let primary_ok = valid_primary.is_some();
    let backup_ok = valid_backup.is_some();

    match (valid_primary, valid_backup) {
        (Some(p), Some(b)) => {
            let difference = (p - b).abs();
            let disagreement = difference > DISAGREEMENT_TOLERANCE;
            if disagreement {
                warn!("sensor disagreement: primary={p:.1}°C, backup={b:.1}°C (diff={difference:.1}°C)");
            }

            Ok(Reconciliation {
                temperature: p,
                source: SensorSource::Primary,
                primary_ok,
                backup_ok,
                disagreement,
            })
        }
        (Some(p), None) => Ok(Reconciliation {
            temperature: p,
            source: SensorSource::Primary,
            primary_ok,
            backup_ok,
            disagreement: false,
        }),
        (None, Some(b)) => Ok(Reconciliation {
            temperature: b,
            source: SensorSource::Backup,
            primary_ok,
            backup_ok,
            disagreement: false,
        }),
        (None, None) => Err(SensorRangeError { primary, backup }),
    }
}

impl SensorPair {
    pub fn reconcile(&self) -> Result<Reconciliation, SensorRangeError> {
        reconcile(self.primary, self.backup)
    }
}
