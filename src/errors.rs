use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::Variant;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("role '{role}' is not permitted to {action}")]
    Forbidden { role: String, action: &'static str },

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{variant} '{id}' not found")]
    NotFound { variant: Variant, id: String },

    #[error("{0}")]
    UnsupportedVariant(String),

    #[error("no route for {0}")]
    UnknownRoute(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind, used in response bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden { .. } => "forbidden",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Validation(_) => "validation",
            AppError::NotFound { .. }
            | AppError::UnsupportedVariant(_)
            | AppError::UnknownRoute(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. }
            | AppError::UnsupportedVariant(_)
            | AppError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error_type, code, msg) = match &self {
            AppError::Unauthorized(_) => (
                "authentication_error",
                "unauthorized",
                "invalid or missing bearer token".to_string(),
            ),
            AppError::Forbidden { .. } => ("permission_error", "forbidden", self.to_string()),
            AppError::InvalidState(_) => ("workflow_error", "invalid_state", self.to_string()),
            AppError::Validation(_) => ("invalid_request_error", "validation_failed", self.to_string()),
            AppError::NotFound { .. } => ("not_found_error", "item_not_found", self.to_string()),
            AppError::UnknownRoute(_) => ("not_found_error", "route_not_found", self.to_string()),
            AppError::UnsupportedVariant(_) => {
                ("not_found_error", "unsupported_variant", self.to_string())
            }
            AppError::Conflict(_) => ("conflict_error", "conflict", self.to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": msg,
            "error": {
                "type": error_type,
                "code": code,
            }
        }));

        (self.status_code(), body).into_response()
    }
}

/// Malformed or incomplete JSON bodies surface as validation failures so they
/// carry the same `{ success: false, message }` body as every other error.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
