use axum::{extract::State, Json};

use super::error::ApiError;
use crate::controller::AppState;
use crate::forecast::GenerationForecast;

/// POST /api/energy/predict
pub async fn predict(State(st): State<AppState>) -> Result<Json<GenerationForecast>, ApiError> {
    Ok(Json(st.controller.forecast_generation().await?))
}
