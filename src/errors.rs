//! Response-layer error type.
//!
//! Collaborator errors are mapped to an [`AppError`] before they reach axum,
//! so no raw storage/database error ever crosses into a response body.
//! Client-facing messages stay generic for the 500-class failures; the
//! detailed cause is logged server-side where the error arises.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{auth::AuthError, services::vault_service::VaultError};

/// Status plus client-facing message, rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::MissingFile | VaultError::InvalidFilename(_) => {
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            // Owner mismatch and genuinely absent records arrive here as the
            // same variant, so non-owners cannot learn a file exists.
            VaultError::NotFound => AppError::new(StatusCode::NOT_FOUND, "file not found"),
            VaultError::StorageUnavailable => AppError::internal("storage unavailable"),
            VaultError::MissingIv => AppError::internal("file record is corrupt"),
            VaultError::Encrypt => AppError::internal("encryption failed"),
            VaultError::Decrypt => AppError::internal("decryption failed"),
            VaultError::Metadata(err) => {
                tracing::error!(error = %err, "metadata store failure");
                AppError::internal("internal server error")
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}
