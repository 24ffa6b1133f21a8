//! Random-forest generation model: one regressor per forecast horizon,
//! persisted together as a single bincode file.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::path::Path;

use super::{ForecastError, GenerationFeatures, GenerationForecast, GenerationPredictor};

type Regressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Serialize, Deserialize)]
pub struct RandomForestForecaster {
    horizons: [Regressor; 3],
}

impl RandomForestForecaster {
    /// Conservative settings for small boards.
    pub fn default_parameters() -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(10),
            min_samples_leaf: 2,
            min_samples_split: 5,
            n_trees: 50,
            m: None,
            keep_samples: false,
            seed: 42,
        }
    }

    /// Fits one regressor per horizon. `targets[i]` holds the 1h/2h/3h
    /// generation observed after `rows[i]`.
    pub fn train(
        rows: &[GenerationFeatures],
        targets: &[[f64; 3]],
        params: RandomForestRegressorParameters,
    ) -> Result<Self, ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::Prediction("cannot train on empty dataset".into()));
        }
        if rows.len() != targets.len() {
            return Err(ForecastError::Prediction(format!(
                "row/target count mismatch: {} rows, {} targets",
                rows.len(),
                targets.len()
            )));
        }

        let flat: Vec<f64> = rows.iter().flat_map(|r| r.to_vec()).collect();
        let x = DenseMatrix::new(rows.len(), GenerationFeatures::NAMES.len(), flat, false);

        let fit = |h: usize| -> Result<Regressor, ForecastError> {
            let y: Vec<f64> = targets.iter().map(|t| t[h]).collect();
            RandomForestRegressor::fit(&x, &y, params.clone())
                .map_err(|e| ForecastError::Prediction(format!("training failed: {e:?}")))
        };

        Ok(Self {
            horizons: [fit(0)?, fit(1)?, fit(2)?],
        })
    }

    pub fn load(path: &Path) -> Result<Self, ForecastError> {
        let bytes = std::fs::read(path).map_err(|e| ForecastError::Load(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| ForecastError::Load(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ForecastError> {
        let bytes = bincode::serialize(self).map_err(|e| ForecastError::Load(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| ForecastError::Load(e.to_string()))
    }
}

impl GenerationPredictor for RandomForestForecaster {
    fn predict(&self, features: &GenerationFeatures) -> Result<GenerationForecast, ForecastError> {
        let x = DenseMatrix::new(1, GenerationFeatures::NAMES.len(), features.to_vec(), false);

        let mut out = [0.0; 3];
        for (slot, model) in out.iter_mut().zip(&self.horizons) {
            let y = model
                .predict(&x)
                .map_err(|e| ForecastError::Prediction(format!("{e:?}")))?;
            *slot = *y
                .first()
                .ok_or_else(|| ForecastError::Prediction("empty prediction".into()))?;
        }
        Ok(GenerationForecast::new(out[0], out[1], out[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn dataset() -> (Vec<GenerationFeatures>, Vec<[f64; 3]>) {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap();
        (0..40)
            .map(|i| {
                let gen = 10.0 * (i % 10) as f64;
                let row = GenerationFeatures::from_parts(
                    start + Duration::hours(i),
                    gen,
                    gen * 100.0,
                    gen - 5.0,
                    gen + 5.0,
                );
                (row, [gen + 1.0, gen + 2.0, gen + 3.0])
            })
            .unzip()
    }

    fn small_params() -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            n_trees: 5,
            max_depth: Some(4),
            min_samples_split: 2,
            ..RandomForestForecaster::default_parameters()
        }
    }

    #[test]
    fn mismatched_targets_rejected() {
        let (rows, targets) = dataset();
        let err = RandomForestForecaster::train(&rows, &targets[..3], small_params());
        assert!(err.is_err());
    }

    #[test]
    fn saved_model_predicts_the_same() {
        let (rows, targets) = dataset();
        let model = RandomForestForecaster::train(&rows, &targets, small_params()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generation.bin");
        model.save(&path).unwrap();
        let loaded = RandomForestForecaster::load(&path).unwrap();

        let sample = rows[12];
        assert_eq!(model.predict(&sample).unwrap(), loaded.predict(&sample).unwrap());
    }

    #[test]
    fn missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RandomForestForecaster::load(&dir.path().join("absent.bin"));
        assert!(matches!(loaded, Err(ForecastError::Load(_))));
    }
}
