use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_data::BusError;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use types::errors::DataError;

use crate::sessions::SessionError;

/// Central error type of the HTTP surface
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::TableNotFound(_) => AppError::NotFound(err.to_string()),
            DataError::UnknownGroup(_) | DataError::Validation(_) => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::InternalError(other.into()),
        }
    }
}

impl From<BusError> for AppError {
    fn from(err: BusError) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::Session(err) => (StatusCode::BAD_REQUEST, err.to_string(), "SESSION_ERROR"),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            AppError::InternalError(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
