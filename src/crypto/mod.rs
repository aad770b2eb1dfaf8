//! Key derivation and envelope encryption for stored blobs.

pub mod envelope;
pub mod kdf;
