// SPDX-License-Identifier: MIT

//! Access/refresh token issuance, verification, and single-slot rotation.
//!
//! Access tokens are stateless: validity is signature + expiry only. Refresh
//! tokens are additionally persisted as the user's single current value, so
//! possession is necessary but not sufficient — a presented refresh token
//! must also equal the stored one. Rotation overwrites that slot with a
//! compare-and-swap, which both invalidates the presented token and rejects
//! a concurrent reuse of it.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::FirestoreDb;
use crate::error::AppError;

/// JWT claims for both token kinds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Unique token id, so two tokens minted within the same second differ
    pub jti: String,
}

/// A freshly issued access + refresh token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies tokens. Built once from `Config`; immutable.
#[derive(Clone)]
pub struct TokenService {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenService {
    pub fn new(config: &crate::config::Config) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_ttl_secs: config.refresh_token_ttl_secs,
        }
    }

    /// Issue a short-lived access token for a user.
    pub fn issue_access_token(&self, username: &str) -> Result<String, AppError> {
        sign(username, &self.access_secret, self.access_ttl_secs)
    }

    /// Issue a longer-lived refresh token. The caller persists it as the
    /// user's current slot (see [`TokenService::issue_pair`]).
    pub fn issue_refresh_token(&self, username: &str) -> Result<String, AppError> {
        sign(username, &self.refresh_secret, self.refresh_ttl_secs)
    }

    /// Verify an access token's signature and expiry.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        verify(token, &self.access_secret)
    }

    /// Verify a refresh token's signature and expiry. Note this does not
    /// check the stored slot; that happens in [`TokenService::rotate`].
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        verify(token, &self.refresh_secret)
    }

    /// Issue both tokens and persist the refresh token on the user record.
    /// Used at login, where no previous token needs to match.
    pub async fn issue_pair(&self, db: &FirestoreDb, username: &str) -> Result<TokenPair, AppError> {
        if db.get_user(username).await?.is_none() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "token issuance for missing user"
            )));
        }

        let pair = TokenPair {
            access_token: self.issue_access_token(username)?,
            refresh_token: self.issue_refresh_token(username)?,
        };

        db.set_refresh_token(username, Some(pair.refresh_token.clone()))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("persisting refresh token: {e}")))?;

        Ok(pair)
    }

    /// Run the rotation protocol for a presented refresh token.
    ///
    /// Verify signature/expiry, load the user, reject unless the stored slot
    /// exactly equals the presented token, then swap in a fresh pair. The
    /// swap is conditioned on the old value at the storage layer, so a
    /// superseded token loses even under concurrent refresh calls.
    pub async fn rotate(&self, db: &FirestoreDb, presented: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .verify_refresh(presented)
            .map_err(|_| AppError::Unauthorized("invalid refresh token".to_string()))?;

        let user = db
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid refresh token".to_string()))?;

        if user.refresh_token.as_deref() != Some(presented) {
            return Err(AppError::Unauthorized("expired refresh token".to_string()));
        }

        let pair = TokenPair {
            access_token: self.issue_access_token(&user.username)?,
            refresh_token: self.issue_refresh_token(&user.username)?,
        };

        let swapped = db
            .rotate_refresh_token(&user.username, presented, &pair.refresh_token)
            .await?;
        if !swapped {
            // Lost the race to a concurrent rotation or a logout.
            return Err(AppError::Unauthorized("expired refresh token".to_string()));
        }

        Ok(pair)
    }

    /// Revoke the user's refresh token (logout). Every previously issued
    /// refresh token becomes permanently unusable.
    pub async fn revoke(&self, db: &FirestoreDb, username: &str) -> Result<(), AppError> {
        db.set_refresh_token(username, None).await
    }
}

fn sign(username: &str, secret: &[u8], ttl_secs: u64) -> Result<String, AppError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now.timestamp() as usize) + ttl_secs as usize,
        jti: now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros())
            .to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))
}

fn verify(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("invalid access token".to_string()))
}
