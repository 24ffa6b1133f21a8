//! Short-horizon solar generation forecast.
//!
//! The controller assembles a [`GenerationFeatures`] row from stored readings
//! and hands it to a [`GenerationPredictor`]. With the `ml` feature the
//! predictor is a random-forest bundle loaded from disk.

#[cfg(feature = "ml")]
pub mod random_forest;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::ForecastConfig;

/// Lux to hourly insolation in MJ/m².
pub fn lux_to_insolation(lux: f64) -> f64 {
    let w_per_m2 = lux * 0.0079;
    w_per_m2 * 0.0036
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("No forecast model loaded")]
    ModelUnavailable,
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// One model input row. Field order is the order the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationFeatures {
    pub year: f64,
    pub month: f64,
    pub day: f64,
    pub hour: f64,
    pub generation: f64,
    pub prev_generation: f64,
    pub yesterday_generation: f64,
    pub insolation: f64,
}

impl GenerationFeatures {
    pub const NAMES: [&'static str; 8] = [
        "year",
        "month",
        "day",
        "hour",
        "generation",
        "prev_generation",
        "yesterday_generation",
        "insolation",
    ];

    /// Builds the row from the latest reading and the two lookback values.
    pub fn from_parts(
        taken_at: DateTime<Utc>,
        generation: f64,
        lux: f64,
        prev_generation: f64,
        yesterday_generation: f64,
    ) -> Self {
        Self {
            year: taken_at.year() as f64,
            month: taken_at.month() as f64,
            day: taken_at.day() as f64,
            hour: taken_at.hour() as f64,
            generation,
            prev_generation,
            yesterday_generation,
            insolation: lux_to_insolation(lux),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.year,
            self.month,
            self.day,
            self.hour,
            self.generation,
            self.prev_generation,
            self.yesterday_generation,
            self.insolation,
        ]
    }
}

/// Predicted generation, watts, one to three hours ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationForecast {
    #[serde(rename = "1h")]
    pub h1: f64,
    #[serde(rename = "2h")]
    pub h2: f64,
    #[serde(rename = "3h")]
    pub h3: f64,
}

impl GenerationForecast {
    /// Values rounded to two decimals, as reported to clients.
    pub fn new(h1: f64, h2: f64, h3: f64) -> Self {
        Self {
            h1: round2(h1),
            h2: round2(h2),
            h3: round2(h3),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub trait GenerationPredictor: Send + Sync {
    fn predict(&self, features: &GenerationFeatures) -> Result<GenerationForecast, ForecastError>;
}

/// Loads the configured model. A missing path or unreadable file leaves the
/// service running without forecasts.
pub fn load_predictor(cfg: &ForecastConfig) -> Option<Arc<dyn GenerationPredictor>> {
    let Some(path) = cfg.model_path.as_deref() else {
        tracing::info!("no forecast model configured");
        return None;
    };

    #[cfg(feature = "ml")]
    {
        return match random_forest::RandomForestForecaster::load(path) {
            Ok(model) => {
                tracing::info!(path = %path.display(), "forecast model loaded");
                Some(Arc::new(model))
            }
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "forecast model not loaded");
                None
            }
        };
    }

    #[cfg(not(feature = "ml"))]
    {
        tracing::warn!(path = %path.display(), "built without the ml feature, forecast disabled");
        return None;
    }
}
