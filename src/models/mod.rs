//! Persisted data models.
//!
//! The only durable record in this service is the per-file metadata row
//! linking an encrypted blob to its owner. Rows map to SQLite via
//! `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod stored_file;
