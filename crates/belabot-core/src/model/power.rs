// ── Power and sensor domain types ──

use serde::{Deserialize, Serialize};

/// Battery / UPS board state derived from the SoC sensor readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ups {
    /// A voltage reading is reported at all.
    pub present: bool,
    /// Voltage is at or above the configured plugged-in threshold.
    pub charging: bool,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

impl Ups {
    /// Build from raw readings; `charging` compares the voltage, truncated to
    /// two decimals, against `plugged_in`.
    pub fn from_readings(voltage: Option<f64>, current: Option<f64>, plugged_in: f64) -> Self {
        Self {
            present: voltage.is_some(),
            charging: voltage.is_some_and(|v| truncate_centivolts(v) >= plugged_in),
            voltage,
            current,
        }
    }
}

/// Drop everything past the second decimal.
pub fn truncate_centivolts(voltage: f64) -> f64 {
    (voltage * 100.0).floor() / 100.0
}

/// Raw SoC readings, kept as the display strings belaUI sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensors {
    pub temperature: Option<String>,
    pub voltage: Option<String>,
    pub current: Option<String>,
}
