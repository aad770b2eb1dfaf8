//! Blob naming policy: maps an original filename to the storage key its
//! ciphertext lives under.
//!
//! Keys are the sanitized original name with an `.enc` marker appended, so a
//! listing of the backing store is recognizably ciphertext while the declared
//! extension stays visible. The transform is pure and deterministic:
//! uploading the same name twice maps to the same key (overwrite semantics).

use thiserror::Error;

/// Marker appended to every storage key.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

const MAX_FILENAME_LEN: usize = 255;

/// Upload types accepted by the service, matched on extension.
const SUPPORTED_EXTENSIONS: [&str; 8] = [
    "jpeg", "jpg", "png", "gif", "pdf", "doc", "docx", "pptx",
];

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("filename is empty")]
    Empty,
    #[error("filename exceeds {MAX_FILENAME_LEN} bytes")]
    TooLong,
    #[error("filename contains unsafe characters")]
    Unsafe,
    #[error("file type not supported")]
    UnsupportedType,
}

/// Compute the storage key for an uploaded filename.
///
/// Client-supplied names are never trusted: anything that could escape the
/// storage root as a key, or break a response header, is rejected outright
/// rather than normalized.
pub fn storage_key(original: &str) -> Result<String, NamingError> {
    ensure_name_safe(original)?;
    ensure_supported(original)?;
    Ok(format!("{original}{ENCRYPTED_SUFFIX}"))
}

/// Strip the encrypted marker to recover the name suggested to clients when
/// they download the file.
pub fn display_name(storage_key: &str) -> &str {
    storage_key
        .strip_suffix(ENCRYPTED_SUFFIX)
        .unwrap_or(storage_key)
}

fn ensure_name_safe(name: &str) -> Result<(), NamingError> {
    if name.is_empty() {
        return Err(NamingError::Empty);
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(NamingError::TooLong);
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(NamingError::Unsafe);
    }
    if name
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\0' || b == b'"')
    {
        return Err(NamingError::Unsafe);
    }
    Ok(())
}

fn ensure_supported(name: &str) -> Result<(), NamingError> {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or(NamingError::UnsupportedType)?;
    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(NamingError::UnsupportedType)
    }
}
