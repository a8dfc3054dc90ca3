//! Stateless signed bearer tokens.
//! A token is `base64url(claims_json) + "." + base64url(hmac_sha256(secret, claims_json))`.
//! Claims embed the subject id, role and unit; validation trusts them without a
//! store lookup, so role/unit changes only take effect at re-issuance. Tokens are
//! never persisted server-side and there is no revocation list; the TTL is kept
//! short instead.

use std::time::Duration;

use anyhow::anyhow;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::model::{Role, User};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal's id.
    pub sub: String,
    pub role: Role,
    pub unit: String,
    /// Issue time, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds. Valid strictly below this instant.
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is structurally malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

/// Issues and validates tokens with a server-held symmetric secret.
/// Read-only after startup; safe to share across request tasks.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    pub ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self { secret: secret.into(), ttl }
    }

    /// Issue a token for the given principal. Stateless: no side effects.
    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            unit: user.unit.clone(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AppError::from(anyhow!("claims encode failed: {e}")))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::from(anyhow!("hmac key rejected: {e}")))?;
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    /// Validate against the current wall clock.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate at an explicit instant. A token is valid up to and excluding its
    /// expiry: `now >= exp` fails. No leeway window is applied.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::BadSignature)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::BadSignature)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::BadSignature)?;
        mac.update(&payload);
        // Constant-time comparison inside the hmac crate.
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
