//! Long-lived opaque refresh tokens.
//!
//! Flow Overview: login issues a random token and persists its SHA-256 digest with
//! an expiry; `/api/refresh` looks the digest up and mints a session token;
//! `/api/revoke` stamps `revoked_at`. Expired rows are rejected lazily on lookup,
//! nothing sweeps them.
//!
//! Exchange does not rotate the refresh token: one token keeps minting session
//! tokens until it expires or is revoked.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

use super::{AuthError, Clock, Identity, SessionTokens};
use crate::store::{RefreshTokenRecord, RefreshTokenStore, StoreError};

/// 256 bits of entropy.
pub const REFRESH_TOKEN_BYTES: usize = 32;
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 24 * 60 * 60);

const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Generate a new raw refresh token (64 hex characters).
///
/// # Errors
///
/// Returns [`AuthError::Entropy`] if the OS random source fails.
pub fn generate_refresh_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| AuthError::Entropy)?;
    Ok(hex::encode(bytes))
}

/// Digest used as the storage key; raw tokens never reach the store.
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct RefreshTokens {
    store: Arc<dyn RefreshTokenStore>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl RefreshTokens {
    #[must_use]
    pub fn new(store: Arc<dyn RefreshTokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            clock,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Create and persist a refresh token for `identity`, returning the raw token.
    ///
    /// # Errors
    ///
    /// Store failures, entropy failures, or repeated hash collisions.
    pub async fn issue(&self, identity: Identity) -> Result<String, AuthError> {
        let lifetime = chrono::Duration::from_std(self.lifetime).map_err(|_| AuthError::Signing)?;

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = generate_refresh_token()?;
            let now = self.clock.now();
            let expires_at = now.checked_add_signed(lifetime).ok_or(AuthError::Signing)?;
            let record = RefreshTokenRecord {
                token_hash: hash_refresh_token(&token),
                user_id: identity,
                created_at: now,
                expires_at,
                revoked_at: None,
            };
            match self.store.store_refresh_token(&record).await {
                Ok(()) => return Ok(token),
                Err(StoreError::Conflict) => {
                    warn!("Refresh token collision on attempt {attempt}, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Conflict.into())
    }

    /// Look up a raw token and return its record if it is still usable.
    ///
    /// # Errors
    ///
    /// [`AuthError::RefreshTokenNotFound`], [`AuthError::RefreshTokenExpired`],
    /// [`AuthError::RefreshTokenRevoked`], or a store failure.
    pub async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, AuthError> {
        let record = self
            .store
            .find_refresh_token(&hash_refresh_token(token))
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;

        if self.clock.now() >= record.expires_at {
            return Err(AuthError::RefreshTokenExpired);
        }
        if record.revoked_at.is_some() {
            return Err(AuthError::RefreshTokenRevoked);
        }
        Ok(record)
    }

    /// Trade a usable refresh token for a default-lifetime session token.
    ///
    /// # Errors
    ///
    /// See [`RefreshTokens::lookup`]; signing failures surface as
    /// [`AuthError::Signing`].
    pub async fn exchange(&self, token: &str, sessions: &SessionTokens) -> Result<String, AuthError> {
        let record = self.lookup(token).await?;
        debug!(user_id = %record.user_id, "Exchanging refresh token");
        sessions.issue(record.user_id, None)
    }

    /// Revoke a refresh token. Revoking an already revoked token succeeds.
    ///
    /// # Errors
    ///
    /// [`AuthError::RefreshTokenNotFound`] if no such token exists, or a store failure.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let found = self
            .store
            .mark_refresh_token_revoked(&hash_refresh_token(token), self.clock.now())
            .await?;
        if found {
            Ok(())
        } else {
            Err(AuthError::RefreshTokenNotFound)
        }
    }
}

impl fmt::Debug for RefreshTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokens")
            .field("lifetime", &self.lifetime)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
