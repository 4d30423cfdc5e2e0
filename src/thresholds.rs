use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a reading is considered anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCause {
    HighTemp,
    LowTemp,
}

impl AlertCause {
    /// Every cause a single device can be tracked under.
    pub const ALL: [AlertCause; 2] = [AlertCause::HighTemp, AlertCause::LowTemp];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCause::HighTemp => "HIGH_TEMP",
            AlertCause::LowTemp => "LOW_TEMP",
        }
    }
}

impl fmt::Display for AlertCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH_TEMP" => Ok(AlertCause::HighTemp),
            "LOW_TEMP" => Ok(AlertCause::LowTemp),
            other => Err(format!("unknown alert cause: {other}")),
        }
    }
}

/// Classify a temperature against the configured thresholds.
///
/// Both thresholds are inclusive. The upper bound is checked first, so a
/// misconfigured pair with `min >= max` resolves toward [`AlertCause::HighTemp`].
pub fn classify(temperature: f64, min_threshold: f64, max_threshold: f64) -> Option<AlertCause> {
    if temperature >= max_threshold {
        Some(AlertCause::HighTemp)
    } else if temperature <= min_threshold {
        Some(AlertCause::LowTemp)
    } else {
        None
    }
}
