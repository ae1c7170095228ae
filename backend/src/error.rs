//! Error handling for the Courier Logistics Service
//!
//! Every failure leaves the API as `{ "error": { "code", "message", "field" } }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::LifecycleError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Concurrency errors
    #[error("Version conflict on {resource}")]
    VersionConflict { resource: String, expected: i64 },

    #[error("Lifecycle rule violated: {0}")]
    Lifecycle(#[from] LifecycleError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying after reloading the document can succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::VersionConflict { .. })
    }

    /// Machine-readable error code, also used in batch reports
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::VersionConflict { .. } => "VERSION_CONFLICT",
            AppError::Lifecycle(err) => lifecycle_status(err).1,
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

fn lifecycle_status(err: &LifecycleError) -> (StatusCode, &'static str) {
    match err {
        LifecycleError::BranchNotSelected
        | LifecycleError::EmptySelection
        | LifecycleError::NoProducts(_)
        | LifecycleError::InvalidProduct { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        LifecycleError::OutOfScope { .. } => (StatusCode::FORBIDDEN, "OUT_OF_SCOPE"),
        LifecycleError::NothingInStock(_)
        | LifecycleError::StockInTransit(_)
        | LifecycleError::NothingToReturn(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK")
        }
        LifecycleError::InvalidShipmentTransition { .. }
        | LifecycleError::InvalidManifestTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE_TRANSITION")
        }
        LifecycleError::ManifestBusy { .. } => (StatusCode::CONFLICT, "MANIFEST_BUSY"),
        LifecycleError::AlreadyApplied(_) => (StatusCode::CONFLICT, "ALREADY_APPLIED"),
        LifecycleError::ConservationViolated { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "CONSERVATION_VIOLATED")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::DuplicateEntry(resource) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("{} already exists", resource),
                ),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::VersionConflict { resource, .. } => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "VERSION_CONFLICT",
                    format!("{} was modified concurrently, reload and retry", resource),
                ),
            ),
            AppError::Lifecycle(err) => {
                let (status, code) = lifecycle_status(err);
                (status, ErrorDetail::new(code, err.to_string()))
            }
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
