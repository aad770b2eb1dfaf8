//! Metadata store collaborator: persisted [`StoredFile`] records.
//!
//! Lookups are always scoped by owner as well as id. That filter is the
//! authorization boundary for downloads: a record owned by someone else is
//! indistinguishable from a record that does not exist.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::stored_file::StoredFile;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Persist a new record. Called only after the blob write has been
    /// acknowledged by the object store.
    async fn insert(&self, record: &StoredFile) -> Result<(), MetadataError>;

    /// Fetch one record by id, scoped to its owner.
    async fn find_by_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<StoredFile>, MetadataError>;

    /// All records belonging to an owner, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<StoredFile>, MetadataError>;
}

/// SQLite-backed repository over the shared connection pool.
#[derive(Clone)]
pub struct SqliteFileRepository {
    db: Arc<SqlitePool>,
}

impl SqliteFileRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileRepository for SqliteFileRepository {
    async fn insert(&self, record: &StoredFile) -> Result<(), MetadataError> {
        sqlx::query(
            "INSERT INTO files (id, filename, url, owner_id, iv, content_type, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.url)
        .bind(record.owner_id)
        .bind(&record.iv)
        .bind(&record.content_type)
        .bind(record.size_bytes)
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn find_by_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<StoredFile>, MetadataError> {
        let record = sqlx::query_as::<_, StoredFile>(
            "SELECT id, filename, url, owner_id, iv, content_type, size_bytes, created_at
             FROM files WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<StoredFile>, MetadataError> {
        let records = sqlx::query_as::<_, StoredFile>(
            "SELECT id, filename, url, owner_id, iv, content_type, size_bytes, created_at
             FROM files WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }
}
