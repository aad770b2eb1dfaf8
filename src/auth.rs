//! Bearer-token identity collaborator.
//!
//! The service never manages accounts; it only resolves an opaque signed
//! bearer credential to the owner id it was issued for. Tokens are
//! `base64url(owner_id.expiry)` followed by a hex HMAC-SHA256 tag over the
//! payload. Verification is a plain call returning the owner or an error;
//! nothing is attached to ambient request state beyond the resolved id.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::{errors::AppError, state::AppState};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access denied, no token provided")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
}

/// Verifies (and, for operators and tests, issues) signed bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<SecretString>,
}

impl TokenVerifier {
    pub fn new(secret: SecretString) -> anyhow::Result<Self> {
        if secret.expose_secret().is_empty() {
            anyhow::bail!("token secret must not be empty");
        }
        Ok(Self {
            secret: Arc::new(secret),
        })
    }

    /// Issue a token for `owner_id` valid for `ttl`.
    pub fn issue(&self, owner_id: Uuid, ttl: Duration) -> String {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let payload = format!("{owner_id}.{expires_at}");
        let tag = self.sign(payload.as_bytes());
        format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), hex::encode(tag))
    }

    /// Resolve a token to the owner id it was issued for.
    ///
    /// Expired, forged, and malformed tokens all collapse to the same
    /// [`AuthError::InvalidToken`]; server logs carry no more detail either,
    /// since the token itself is the only context available.
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let (payload_b64, tag_hex) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let tag = hex::decode(tag_hex).map_err(|_| AuthError::InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| AuthError::InvalidToken)?;

        let payload = String::from_utf8(payload).map_err(|_| AuthError::InvalidToken)?;
        let (owner, expires_at) = payload.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| AuthError::InvalidToken)?;
        if expires_at <= Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        Uuid::parse_str(owner).map_err(|_| AuthError::InvalidToken)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Resolved caller identity, extracted from the `Authorization` header.
pub struct Owner(pub Uuid);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?;
        let owner_id = state.verifier.verify(token)?;
        Ok(Owner(owner_id))
    }
}
