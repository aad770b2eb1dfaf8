use anyhow::{Context, Result};
use axum::Router;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod crypto;
mod errors;
mod handlers;
mod models;
mod naming;
mod routes;
mod services;
mod state;

use config::AppConfig;
use crypto::kdf::{KdfParams, derive_master_key};
use services::{
    file_repository::SqliteFileRepository, object_store::DiskObjectStore,
    vault_service::VaultService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (cfg, migrate) = AppConfig::from_env_and_args()?;
    tracing::info!("starting file-vault with config: {:?}", cfg);

    // Key material comes first: a process that cannot derive its vault key
    // must not bind, let alone accept uploads.
    let master_key =
        derive_master_key(&cfg.vault_secret, &KdfParams::default()).context("deriving vault key")?;
    tracing::info!("vault key derived");
    let verifier = auth::TokenVerifier::new(cfg.token_secret.clone())?;

    fs::create_dir_all(&cfg.storage_dir)
        .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;

    let db = open_database(&cfg.database_url).await?;

    if migrate {
        run_migrations(&db).await?;
        tracing::info!("database migration complete");
        return Ok(());
    }

    let store = Arc::new(DiskObjectStore::new(cfg.storage_dir.clone()));
    let files = Arc::new(SqliteFileRepository::new(db.clone()));
    let vault = VaultService::new(store, files, master_key);

    let app_state = state::AppState {
        vault,
        verifier,
        db,
        storage_dir: cfg.storage_dir.clone().into(),
    };

    let app: Router = routes::routes::routes().with_state(app_state);

    let listener = bind(&cfg).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the SQLite pool, creating the database file and its parent directory
/// when missing (sqlx will not create the file for a plain `sqlite://` URL).
async fn open_database(url: &str) -> Result<Arc<SqlitePool>> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("file:");
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    if !Path::new(path).exists() {
        fs::File::create(path).with_context(|| format!("creating database file {path}"))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    Ok(Arc::new(pool))
}

async fn bind(cfg: &AppConfig) -> Result<TcpListener> {
    let addr = cfg.addr();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        // Unprivileged environments can refuse the wildcard bind; fall back
        // to loopback so local runs still come up.
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!("binding {addr} failed ({err}), retrying on {fallback}");
            Ok(TcpListener::bind(&fallback).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Apply the schema from the SQL file shipped with the repository.
async fn run_migrations(db: &SqlitePool) -> Result<()> {
    const MIGRATION: &str = "migrations/0001_init.sql";

    let sql =
        fs::read_to_string(MIGRATION).with_context(|| format!("reading {MIGRATION}"))?;
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty());

    for stmt in statements {
        tracing::debug!("executing migration statement: {stmt}");
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
