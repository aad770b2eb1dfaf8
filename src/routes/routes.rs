//! Defines routes for the encrypted file API.
//!
//! ## Structure
//! - **File endpoints** (all require a bearer token)
//!   - `POST /files`                — upload one file part, encrypted at rest
//!   - `GET  /files`                — list the caller's file metadata
//!   - `GET  /files/{id}`           — metadata for one file
//!   - `GET  /files/{id}/download`  — decrypt and return one file
//!
//! - **Probes** (unauthenticated)
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (SQLite + storage-dir I/O)

use crate::{
    handlers::{
        file_handlers::{download_file, get_file, list_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
    routing::post,
};

/// Whole files are buffered for encryption, so the accepted body size is
/// bounded. Streaming/chunked encryption is out of scope.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build and return the router for all endpoints.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file endpoints
        .route("/files", post(upload_file).get(list_files))
        .route("/files/{id}", get(get_file))
        .route("/files/{id}/download", get(download_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
