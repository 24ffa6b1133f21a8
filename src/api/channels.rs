use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::error::ApiError;
use crate::budget::{AvailabilityMap, BudgetOverrides, ChannelSelection};
use crate::controller::AppState;

/// Optional per-request replacements for configured values.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionQuery {
    pub duration_minutes: Option<f64>,
    pub battery_protection_threshold: Option<f64>,
}

impl DecisionQuery {
    fn overrides(&self) -> BudgetOverrides {
        duration_override(self.duration_minutes)
    }
}

/// Overrides accepted by the optimal-combination endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimalQuery {
    pub duration_minutes: Option<f64>,
}

fn duration_override(duration_minutes: Option<f64>) -> BudgetOverrides {
    BudgetOverrides {
        channels: None,
        duration_minutes,
    }
}

/// POST /api/channels/available
pub async fn available(
    State(st): State<AppState>,
    query: Result<Query<DecisionQuery>, QueryRejection>,
) -> Result<Json<AvailabilityMap>, ApiError> {
    let Query(q) = query?;
    let map = st
        .controller
        .available_channels(&q.overrides(), q.battery_protection_threshold)
        .await?;
    Ok(Json(map))
}

/// POST /api/channels/optimal
pub async fn optimal(
    State(st): State<AppState>,
    query: Result<Query<OptimalQuery>, QueryRejection>,
) -> Result<Json<ChannelSelection>, ApiError> {
    let Query(q) = query?;
    let overrides = duration_override(q.duration_minutes);
    Ok(Json(st.controller.optimal_combination(&overrides).await?))
}
