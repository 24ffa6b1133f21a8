use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry sample from the installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Battery state of charge, percent.
    pub soc: f64,
    /// Instantaneous solar output, watts.
    pub solar_w: f64,
    /// Ambient illuminance.
    pub lux: f64,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(soc: f64, solar_w: f64, lux: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            soc,
            solar_w,
            lux,
            timestamp,
        }
    }
}
