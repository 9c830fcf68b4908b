//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use crate::research::error::ResearchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// All errors that can occur in the application are represented by this enum.
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body or parameters were rejected
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration update is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request conflicts with the current session state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Error raised by the research pipeline
    #[error(transparent)]
    Research(#[from] ResearchError),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Research(e) => match e {
                ResearchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                ResearchError::InvalidTransition { .. } | ResearchError::NoActiveSession => {
                    StatusCode::CONFLICT
                }
                // Upstream model failure
                ResearchError::Model(_) => StatusCode::BAD_GATEWAY,
                ResearchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
