//! Sensor ingestion and history endpoints.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::controller::AppState;
use crate::domain::{SensorReading, TradeQuery, TradeRecord};

/// Raw telemetry from the installation. Fields are optional here so a
/// missing one is reported as a bad request rather than a decode error.
#[derive(Debug, Deserialize)]
pub struct SolarPayload {
    pub soc: Option<f64>,
    pub solar_w: Option<f64>,
    pub lux: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/data/solar
pub async fn ingest_solar(
    State(st): State<AppState>,
    payload: Result<Json<SolarPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(payload) = payload?;
    let (Some(soc), Some(solar_w), Some(lux)) = (payload.soc, payload.solar_w, payload.lux) else {
        let missing: Vec<&str> = [
            ("soc", payload.soc.is_none()),
            ("solar_w", payload.solar_w.is_none()),
            ("lux", payload.lux.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        return Err(ApiError::BadRequest(format!(
            "missing fields: {}",
            missing.join(", ")
        )));
    };

    st.controller.record_reading(soc, solar_w, lux).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "sensor reading stored".to_string(),
        }),
    ))
}

/// GET /api/data/latest
pub async fn latest(State(st): State<AppState>) -> Result<Json<SensorReading>, ApiError> {
    Ok(Json(st.controller.latest_reading().await?))
}

/// GET /api/data/history
pub async fn history(
    State(st): State<AppState>,
    query: Result<Query<TradeQuery>, QueryRejection>,
) -> Result<Json<Vec<TradeRecord>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(st.controller.trade_history(&query).await?))
}
