//! Metadata record for one encrypted blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One uploaded file: where its ciphertext lives, who owns it, and the nonce
/// it was sealed under.
///
/// A record is inserted exactly once, as the terminal step of a successful
/// upload (the blob is already durable by then), and is never mutated
/// afterwards. Downloads only read.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredFile {
    /// Internal UUID, assigned at creation.
    pub id: Uuid,

    /// Storage key the ciphertext lives under (original name + `.enc`).
    pub filename: String,

    /// Retrieval locator returned by the object store.
    pub url: String,

    /// Identity that uploaded the file. Every lookup filters on this.
    pub owner_id: Uuid,

    /// Hex-encoded nonce used for this file's encryption. NULL can only
    /// appear through data corruption and is fatal at read time, never
    /// recoverable.
    pub iv: Option<String>,

    /// Declared content type of the plaintext.
    pub content_type: Option<String>,

    /// Ciphertext size in bytes (plaintext plus auth tag).
    pub size_bytes: i64,

    /// When the upload completed.
    pub created_at: DateTime<Utc>,
}
