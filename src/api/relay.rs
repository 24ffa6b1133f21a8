use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use super::error::ApiError;
use crate::controller::AppState;
use crate::domain::{ChannelId, RelayStatus};

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub message: &'static str,
    pub status: RelayStatus,
}

/// GET /api/relay/status
pub async fn status(State(st): State<AppState>) -> Result<Json<RelayStatus>, ApiError> {
    Ok(Json(st.controller.relay_status().await?))
}

/// POST /api/relay/control with the position of every channel,
/// e.g. `{"A": true, "B": false, "C": false, "D": true}`.
pub async fn control(
    State(st): State<AppState>,
    command: Result<Json<BTreeMap<ChannelId, bool>>, JsonRejection>,
) -> Result<Json<RelayResponse>, ApiError> {
    let Json(command) = command?;
    let status = st.controller.apply_relay_command(command).await?;
    Ok(Json(RelayResponse {
        message: "success",
        status,
    }))
}

/// POST /api/relay/reset
pub async fn reset(State(st): State<AppState>) -> Result<Json<RelayResponse>, ApiError> {
    let status = st.controller.reset_relays().await?;
    Ok(Json(RelayResponse {
        message: "all relays off",
        status,
    }))
}
