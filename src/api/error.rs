use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::budget::BudgetError;
use crate::controller::ControlError;
use crate::forecast::ForecastError;
use crate::hardware::TransportError;
use crate::repo::RepoError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::InternalError(_) => "InternalServerError",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::BadGateway(_) => "BadGateway",
            ApiError::GatewayTimeout(_) => "GatewayTimeout",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            ApiError::ServiceUnavailable(_)
            | ApiError::BadGateway(_)
            | ApiError::GatewayTimeout(_) => {
                tracing::warn!(error = %self, "upstream failure");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let body = ErrorResponse {
            error: self.error_type(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(error: ControlError) -> Self {
        match error {
            ControlError::Budget(BudgetError::InvalidInput(msg)) => ApiError::BadRequest(msg),
            ControlError::InvalidCommand(msg) => ApiError::BadRequest(msg),
            ControlError::NoSensorData | ControlError::InsufficientHistory(_) => {
                ApiError::NotFound(error.to_string())
            }
            ControlError::Store(RepoError::Unavailable(msg)) => ApiError::ServiceUnavailable(msg),
            ControlError::Store(e) => ApiError::InternalError(e.to_string()),
            ControlError::Transport(e) => match e {
                TransportError::Timeout => ApiError::GatewayTimeout(e.to_string()),
                TransportError::NotConfigured | TransportError::Connect(_) => {
                    ApiError::ServiceUnavailable(e.to_string())
                }
                TransportError::Status(_) | TransportError::Other(_) => {
                    ApiError::BadGateway(e.to_string())
                }
            },
            ControlError::Forecast(ForecastError::ModelUnavailable) => {
                ApiError::ServiceUnavailable(ForecastError::ModelUnavailable.to_string())
            }
            ControlError::Forecast(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
