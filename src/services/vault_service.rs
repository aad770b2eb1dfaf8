//! VaultService — the encrypted file pipeline.
//!
//! Upload: seal the payload under the process-wide key, write the ciphertext
//! to the object store, then persist metadata. The blob write must be
//! acknowledged before the metadata insert is attempted, so a crash between
//! the two steps can only leave an orphaned blob, never a record pointing at
//! nothing.
//!
//! Download: resolve metadata by id **and** owner first, then fetch and open
//! the ciphertext. The owner-scoped lookup is the authorization boundary;
//! nothing is fetched or decrypted for a caller who does not own the record.

use bytes::Bytes;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    crypto::{envelope, kdf::MasterKey},
    models::stored_file::StoredFile,
    naming::{self, NamingError},
    services::{
        file_repository::{FileRepository, MetadataError},
        object_store::ObjectStore,
    },
};

/// Upper bound on any single object-store call. Expiring surfaces as
/// [`VaultError::StorageUnavailable`] rather than hanging the request.
const STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no file uploaded")]
    MissingFile,
    #[error(transparent)]
    InvalidFilename(#[from] NamingError),
    #[error("file not found")]
    NotFound,
    #[error("storage unavailable")]
    StorageUnavailable,
    #[error("file record is corrupt")]
    MissingIv,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Decrypted payload handed back to the response layer.
pub struct DownloadedFile {
    /// Name suggested to the client (storage key with the marker stripped).
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Orchestrates encryption, blob storage, and metadata for uploaded files.
///
/// Collaborators are injected at construction; the service holds no other
/// state beyond the derived key, which is read-only for the process lifetime,
/// so the whole pipeline is safe under arbitrary request concurrency.
#[derive(Clone)]
pub struct VaultService {
    store: Arc<dyn ObjectStore>,
    files: Arc<dyn FileRepository>,
    key: MasterKey,
}

impl VaultService {
    pub fn new(store: Arc<dyn ObjectStore>, files: Arc<dyn FileRepository>, key: MasterKey) -> Self {
        Self { store, files, key }
    }

    /// Encrypt and store one uploaded file for `owner_id`.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        original_name: &str,
        content_type: Option<String>,
        payload: Bytes,
    ) -> VaultResult<StoredFile> {
        if payload.is_empty() {
            return Err(VaultError::MissingFile);
        }
        let storage_key = naming::storage_key(original_name)?;

        let sealed = envelope::seal(&self.key, &payload).map_err(|err| {
            error!(key = %storage_key, error = %err, "failed to seal upload");
            VaultError::Encrypt
        })?;
        let size_bytes = sealed.ciphertext.len() as i64;

        let put = self
            .store
            .put(&storage_key, Bytes::from(sealed.ciphertext), content_type.as_deref());
        let locator = match tokio::time::timeout(STORAGE_TIMEOUT, put).await {
            Ok(Ok(locator)) => locator,
            Ok(Err(err)) => {
                warn!(key = %storage_key, error = %err, "object store put failed");
                return Err(VaultError::StorageUnavailable);
            }
            Err(_) => {
                warn!(key = %storage_key, "object store put timed out");
                return Err(VaultError::StorageUnavailable);
            }
        };

        let record = StoredFile {
            id: Uuid::new_v4(),
            filename: storage_key,
            url: locator,
            owner_id,
            iv: Some(hex::encode(sealed.nonce)),
            content_type,
            size_bytes,
            created_at: Utc::now(),
        };

        if let Err(err) = self.files.insert(&record).await {
            // The blob is durable but nothing references it. There is no
            // reconciliation job; the key is logged for out-of-band cleanup.
            error!(
                key = %record.filename,
                error = %err,
                "metadata insert failed after blob write, blob orphaned"
            );
            return Err(err.into());
        }

        Ok(record)
    }

    /// Fetch, authorize, and decrypt one file for `owner_id`.
    pub async fn download(&self, id: Uuid, owner_id: Uuid) -> VaultResult<DownloadedFile> {
        let record = self
            .files
            .find_by_owner(id, owner_id)
            .await?
            .ok_or(VaultError::NotFound)?;

        // Integrity gate before any storage traffic: a record without its
        // nonce can never be decrypted, so spending a fetch on it is wasted
        // work and the condition must be alarmed on, not retried.
        let Some(iv_hex) = record.iv.as_deref() else {
            error!(file_id = %id, "stored file has no IV, record is corrupt");
            return Err(VaultError::MissingIv);
        };
        let nonce = hex::decode(iv_hex).map_err(|_| {
            error!(file_id = %id, "stored IV is not valid hex");
            VaultError::Decrypt
        })?;

        let ciphertext = match tokio::time::timeout(STORAGE_TIMEOUT, self.store.get(&record.filename))
            .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                warn!(file_id = %id, key = %record.filename, error = %err, "object store get failed");
                return Err(VaultError::StorageUnavailable);
            }
            Err(_) => {
                warn!(file_id = %id, key = %record.filename, "object store get timed out");
                return Err(VaultError::StorageUnavailable);
            }
        };
        if ciphertext.is_empty() {
            warn!(file_id = %id, key = %record.filename, "object store returned an empty blob");
            return Err(VaultError::StorageUnavailable);
        }

        let plaintext = envelope::open(&self.key, &ciphertext, &nonce).map_err(|_| {
            // Wrong key after an unmigrated rotation, or corrupted
            // ciphertext. Never log key or nonce material here.
            error!(file_id = %id, "decryption failed");
            VaultError::Decrypt
        })?;

        Ok(DownloadedFile {
            filename: naming::display_name(&record.filename).to_string(),
            content_type: record.content_type.clone(),
            bytes: plaintext,
        })
    }

    /// Metadata for one of the caller's files.
    pub async fn metadata(&self, id: Uuid, owner_id: Uuid) -> VaultResult<StoredFile> {
        self.files
            .find_by_owner(id, owner_id)
            .await?
            .ok_or(VaultError::NotFound)
    }

    /// All of the caller's files, newest first.
    pub async fn list(&self, owner_id: Uuid) -> VaultResult<Vec<StoredFile>> {
        Ok(self.files.list_for_owner(owner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::kdf::KEY_SIZE, services::object_store::ObjectStoreError};
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::Mutex,
        sync::atomic::{AtomicUsize, Ordering},
    };

    /// In-memory object store that counts calls and can be told to fail.
    #[derive(Default)]
    struct MemObjectStore {
        blobs: Mutex<HashMap<String, Bytes>>,
        gets: AtomicUsize,
        fail_puts: bool,
    }

    impl MemObjectStore {
        fn failing() -> Self {
            Self {
                fail_puts: true,
                ..Self::default()
            }
        }

        fn blob(&self, key: &str) -> Option<Bytes> {
            self.blobs.lock().unwrap().get(key).cloned()
        }

        fn replace_blob(&self, key: &str, bytes: Bytes) {
            self.blobs.lock().unwrap().insert(key.to_string(), bytes);
        }

        fn blob_count(&self) -> usize {
            self.blobs.lock().unwrap().len()
        }

        fn get_calls(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for MemObjectStore {
        async fn put(
            &self,
            key: &str,
            bytes: Bytes,
            _content_type: Option<&str>,
        ) -> Result<String, ObjectStoreError> {
            if self.fail_puts {
                return Err(ObjectStoreError::Io(std::io::Error::other("backend down")));
            }
            self.blobs.lock().unwrap().insert(key.to_string(), bytes);
            Ok(format!("mem://{key}"))
        }

        async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.blob(key)
                .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
        }
    }

    #[derive(Default)]
    struct MemFileRepository {
        rows: Mutex<Vec<StoredFile>>,
    }

    impl MemFileRepository {
        fn push(&self, record: StoredFile) {
            self.rows.lock().unwrap().push(record);
        }

        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FileRepository for MemFileRepository {
        async fn insert(&self, record: &StoredFile) -> Result<(), MetadataError> {
            self.rows.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn find_by_owner(
            &self,
            id: Uuid,
            owner_id: Uuid,
        ) -> Result<Option<StoredFile>, MetadataError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id && r.owner_id == owner_id)
                .cloned())
        }

        async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<StoredFile>, MetadataError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.owner_id == owner_id)
                .cloned()
                .collect())
        }
    }

    struct Fixture {
        store: Arc<MemObjectStore>,
        files: Arc<MemFileRepository>,
        vault: VaultService,
    }

    fn fixture_with(store: MemObjectStore) -> Fixture {
        let store = Arc::new(store);
        let files = Arc::new(MemFileRepository::default());
        let vault = VaultService::new(
            store.clone(),
            files.clone(),
            MasterKey::from_bytes([9u8; KEY_SIZE]),
        );
        Fixture {
            store,
            files,
            vault,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemObjectStore::default())
    }

    fn pdf_payload() -> Bytes {
        let mut payload = b"%PDF-1.4\n".to_vec();
        payload.extend(std::iter::repeat(0xC7u8).take(10 * 1024 - payload.len()));
        Bytes::from(payload)
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let payload = pdf_payload();

        let record = fx
            .vault
            .upload(owner, "report.pdf", Some("application/pdf".into()), payload.clone())
            .await
            .unwrap();
        assert_eq!(record.filename, "report.pdf.enc");
        assert_eq!(record.url, "mem://report.pdf.enc");

        let downloaded = fx.vault.download(record.id, owner).await.unwrap();
        assert_eq!(downloaded.bytes, payload);
        assert_eq!(downloaded.filename, "report.pdf");
        assert_eq!(downloaded.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn stored_blob_is_not_the_plaintext() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let payload = pdf_payload();

        fx.vault
            .upload(owner, "report.pdf", None, payload.clone())
            .await
            .unwrap();

        let blob = fx.store.blob("report.pdf.enc").unwrap();
        assert_ne!(&blob[..], &payload[..]);
        assert_eq!(blob.len(), payload.len() + 16);
    }

    #[tokio::test]
    async fn download_under_another_owner_is_not_found() {
        let fx = fixture();
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();

        let record = fx
            .vault
            .upload(owner_a, "private.pdf", None, pdf_payload())
            .await
            .unwrap();

        let result = fx.vault.download(record.id, owner_b).await;
        assert!(matches!(result, Err(VaultError::NotFound)));
    }

    #[tokio::test]
    async fn missing_iv_fails_before_any_storage_fetch() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        fx.files.push(StoredFile {
            id: Uuid::new_v4(),
            filename: "corrupt.pdf.enc".into(),
            url: "mem://corrupt.pdf.enc".into(),
            owner_id: owner,
            iv: None,
            content_type: None,
            size_bytes: 16,
            created_at: Utc::now(),
        });
        let id = fx.files.rows.lock().unwrap()[0].id;

        let result = fx.vault.download(id, owner).await;
        assert!(matches!(result, Err(VaultError::MissingIv)));
        assert_eq!(fx.store.get_calls(), 0);
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_to_decrypt() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        let record = fx
            .vault
            .upload(owner, "report.pdf", None, pdf_payload())
            .await
            .unwrap();

        let mut blob = fx.store.blob("report.pdf.enc").unwrap().to_vec();
        blob[100] ^= 0x01;
        fx.store.replace_blob("report.pdf.enc", Bytes::from(blob));

        let result = fx.vault.download(record.id, owner).await;
        assert!(matches!(result, Err(VaultError::Decrypt)));
    }

    #[tokio::test]
    async fn reuploading_the_same_name_replaces_the_blob() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        fx.vault
            .upload(owner, "notes.pdf", None, Bytes::from_static(b"first version"))
            .await
            .unwrap();
        let second = fx
            .vault
            .upload(owner, "notes.pdf", None, Bytes::from_static(b"second version"))
            .await
            .unwrap();

        assert_eq!(fx.store.blob_count(), 1);

        let downloaded = fx.vault.download(second.id, owner).await.unwrap();
        assert_eq!(downloaded.bytes, b"second version");
    }

    #[tokio::test]
    async fn failed_blob_write_persists_no_metadata() {
        let fx = fixture_with(MemObjectStore::failing());
        let owner = Uuid::new_v4();

        let result = fx
            .vault
            .upload(owner, "report.pdf", None, pdf_payload())
            .await;

        assert!(matches!(result, Err(VaultError::StorageUnavailable)));
        assert_eq!(fx.files.row_count(), 0);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let fx = fixture();
        let result = fx
            .vault
            .upload(Uuid::new_v4(), "report.pdf", None, Bytes::new())
            .await;
        assert!(matches!(result, Err(VaultError::MissingFile)));
        assert_eq!(fx.store.blob_count(), 0);
    }

    #[tokio::test]
    async fn traversal_filename_is_rejected_before_storage() {
        let fx = fixture();
        let result = fx
            .vault
            .upload(
                Uuid::new_v4(),
                "../../etc/shadow.pdf",
                None,
                Bytes::from_static(b"x"),
            )
            .await;
        assert!(matches!(result, Err(VaultError::InvalidFilename(_))));
        assert_eq!(fx.store.blob_count(), 0);
    }

    #[tokio::test]
    async fn missing_blob_surfaces_as_storage_unavailable() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let record = fx
            .vault
            .upload(owner, "report.pdf", None, pdf_payload())
            .await
            .unwrap();

        fx.store.blobs.lock().unwrap().clear();

        let result = fx.vault.download(record.id, owner).await;
        assert!(matches!(result, Err(VaultError::StorageUnavailable)));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_owner() {
        let fx = fixture();
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();

        fx.vault
            .upload(owner_a, "a.pdf", None, Bytes::from_static(b"a"))
            .await
            .unwrap();
        fx.vault
            .upload(owner_b, "b.pdf", None, Bytes::from_static(b"b"))
            .await
            .unwrap();

        let listed = fx.vault.list(owner_a).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, "a.pdf.enc");
    }
}
