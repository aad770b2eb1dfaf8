//! Shared application state handed to every handler.

use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::{auth::TokenVerifier, services::vault_service::VaultService};

/// Explicitly constructed at startup; no globals. The pool and storage dir
/// are carried alongside the service for the readiness probe.
#[derive(Clone)]
pub struct AppState {
    pub vault: VaultService,
    pub verifier: TokenVerifier,
    pub db: Arc<SqlitePool>,
    pub storage_dir: PathBuf,
}
