//! Shared error handling utilities.
//!
//! The lifecycle core reports failures through [`CoreError`], one variant per
//! kind in the error taxonomy. Handlers translate a `CoreError` into the
//! `{error, code}` JSON body via [`ApiError::from_core`]; low-level driver
//! errors are wrapped, never surfaced verbatim.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-fixable input problems; all failures collected, not audited as
    /// a security event.
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("invitation rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Notification dispatch failed after the invitation row was rolled back.
    #[error("notification could not be delivered: {0}")]
    EmailDelivery(String),

    /// A storage or collaborator call failed in a way the operation cannot
    /// absorb.
    #[error("{0}")]
    Dependency(String),
}

impl From<crate::store::StoreError> for CoreError {
    fn from(err: crate::store::StoreError) -> Self {
        error!(error = %err, "Record store failure");
        CoreError::Dependency("A storage operation failed".to_string())
    }
}

impl From<crate::auth::DirectoryError> for CoreError {
    fn from(err: crate::auth::DirectoryError) -> Self {
        use crate::auth::DirectoryError;
        match err {
            DirectoryError::InvalidToken => {
                CoreError::Unauthenticated("Invalid or expired token".to_string())
            }
            DirectoryError::UnknownAccount => {
                CoreError::Unauthenticated("Account not found or inactive".to_string())
            }
            DirectoryError::DuplicateEmail => {
                CoreError::Conflict("An account with this email already exists".to_string())
            }
            DirectoryError::Credential(msg) => {
                error!(error = %msg, "Credential processing failure");
                CoreError::Dependency("Credential processing failed".to_string())
            }
            DirectoryError::Store(e) => e.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(error, code)))
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(error, code)))
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }

    pub fn conflict(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(error, code)))
    }

    pub fn internal(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(error, code)),
        )
    }

    pub fn from_core(err: CoreError) -> (StatusCode, Json<Self>) {
        match err {
            CoreError::Validation(failures) => (
                StatusCode::BAD_REQUEST,
                Json(Self {
                    error: "Validation failed".to_string(),
                    code: "VALIDATION_ERROR".to_string(),
                    details: Some(failures),
                }),
            ),
            CoreError::Unauthenticated(msg) => Self::unauthorized(msg, "UNAUTHENTICATED"),
            CoreError::Forbidden(msg) => Self::forbidden(msg, "FORBIDDEN"),
            CoreError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(Self::new(
                    format!(
                        "Invitation rate limit exceeded. Try again in {} seconds",
                        retry_after_secs
                    ),
                    "RATE_LIMIT_EXCEEDED",
                )),
            ),
            CoreError::Conflict(msg) => Self::conflict(msg, "CONFLICT"),
            CoreError::NotFound(msg) => Self::not_found(msg, "NOT_FOUND"),
            CoreError::EmailDelivery(msg) => (
                StatusCode::BAD_GATEWAY,
                Json(Self::new(msg, "EMAIL_DELIVERY_FAILED")),
            ),
            CoreError::Dependency(msg) => Self::internal(msg, "DEPENDENCY_ERROR"),
        }
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;
