// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Pre-flight validation; the message lists every missing field.
    #[error("{0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("User update failed: {0}")]
    UserUpdateFailed(String),

    /// The user record was already written when this happened.
    #[error("Company update failed: {0}")]
    CompanyUpdateFailed(String),

    #[error("Document not found after write: {0}")]
    DocumentNotFoundAfterWrite(String),

    /// Provisioning failed after both records were written.
    #[error("Payment account provisioning pending: {message}")]
    ProvisioningPending {
        message: String,
        missing_fields: Vec<String>,
    },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_fields: Vec<String>,
}

impl AppError {
    /// Status code and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Identity(_) => (StatusCode::BAD_REQUEST, "identity_error"),
            AppError::Upload(_) => (StatusCode::BAD_GATEWAY, "upload_failed"),
            AppError::UserUpdateFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "user_update_failed")
            }
            AppError::CompanyUpdateFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "company_update_failed")
            }
            AppError::DocumentNotFoundAfterWrite(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "document_not_found_after_write",
            ),
            AppError::ProvisioningPending { .. } => {
                (StatusCode::BAD_GATEWAY, "provisioning_pending")
            }
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// User-facing detail, if this error kind exposes one.
    pub fn public_details(&self) -> Option<String> {
        match self {
            AppError::Unauthorized | AppError::InvalidToken => None,
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::UserUpdateFailed(msg) | AppError::CompanyUpdateFailed(msg) => {
                tracing::error!(error = %msg, kind = %self, "Split-save write failed");
                Some(self.to_string())
            }
            AppError::ProvisioningPending { message, .. } => Some(message.clone()),
            AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Identity(msg)
            | AppError::Upload(msg)
            | AppError::DocumentNotFoundAfterWrite(msg)
            | AppError::Upstream(msg) => Some(msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let details = self.public_details();
        let missing_fields = match self {
            AppError::ProvisioningPending { missing_fields, .. } => missing_fields,
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            missing_fields,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
