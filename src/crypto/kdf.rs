//! Argon2id derivation of the process-wide vault key.

use anyhow::{Result, bail};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

/// Key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Fixed application salt. A deployment derives exactly one key, so the salt
/// does not need to vary; it only has to keep derivation deterministic across
/// restarts and distinct from other applications sharing a secret.
const KEY_SALT: &[u8; 16] = b"file-vault/kdf/1";

/// The 256-bit symmetric key every blob is sealed under.
///
/// Derived once at startup and read-only afterwards. Zeroized on drop so key
/// material does not linger in freed memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub mem_cost_kib: u32,
    /// Iteration count.
    pub time_cost: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Stretch the operator secret into a [`MasterKey`].
///
/// Deterministic for a given secret. An empty secret is rejected here so the
/// process refuses to start rather than silently encrypting under a key
/// derived from nothing.
pub fn derive_master_key(secret: &SecretString, params: &KdfParams) -> Result<MasterKey> {
    let secret_bytes = secret.expose_secret().as_bytes();
    if secret_bytes.is_empty() {
        bail!("vault secret must not be empty");
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| anyhow::anyhow!("invalid Argon2id params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(secret_bytes, KEY_SALT, &mut key)
        .map_err(|e| anyhow::anyhow!("key derivation failed: {e}"))?;

    Ok(MasterKey::from_bytes(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests do not pay the production stretch cost.
    fn test_params() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let secret = SecretString::from("correct horse battery staple");
        let key1 = derive_master_key(&secret, &test_params()).unwrap();
        let key2 = derive_master_key(&secret, &test_params()).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn different_secrets_derive_different_keys() {
        let key1 = derive_master_key(&SecretString::from("secret-a"), &test_params()).unwrap();
        let key2 = derive_master_key(&SecretString::from("secret-b"), &test_params()).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let result = derive_master_key(&SecretString::from(""), &test_params());
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let key = MasterKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }
}
