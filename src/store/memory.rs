use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreError, UserRecord, UserStore};
use crate::auth::{Clock, Identity, SystemClock};

/// In-process store used when no database is configured, and by tests.
#[derive(Debug)]
pub struct MemoryStore {
    users: RwLock<HashMap<Identity, UserRecord>>,
    refresh_tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|user| user.email == email) {
            return Err(StoreError::Conflict);
        }
        let now = self.clock.now();
        let record = UserRecord {
            id: Identity::new(Uuid::now_v7()),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn upgrade_user(&self, id: Identity) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let now = self.clock.now();
        Ok(users.get_mut(&id).is_some_and(|user| {
            user.is_chirpy_red = true;
            user.updated_at = now;
            true
        }))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.contains_key(&record.token_hash) {
            return Err(StoreError::Conflict);
        }
        tokens.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.refresh_tokens.read().await.get(token_hash).cloned())
    }

    async fn mark_refresh_token_revoked(
        &self,
        token_hash: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        Ok(tokens.get_mut(token_hash).is_some_and(|record| {
            record.revoked_at.get_or_insert(revoked_at);
            true
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Duration;

    fn record(hash: &str, user_id: Identity) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            token_hash: hash.to_string(),
            user_id,
            created_at: now,
            expires_at: now + Duration::days(60),
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() -> Result<()> {
        let store = MemoryStore::new();
        let user = store.create_user("a@b.com", "hash").await?;
        assert_eq!(user.email, "a@b.com");
        assert!(!user.is_chirpy_red);

        let duplicate = store.create_user("a@b.com", "other").await;
        assert!(matches!(duplicate, Err(StoreError::Conflict)));

        let found = store
            .find_user_by_email("a@b.com")
            .await?
            .context("user should exist")?;
        assert_eq!(found, user);
        assert!(store.find_user_by_email("x@y.com").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn upgrade_user_reports_missing_users() -> Result<()> {
        let store = MemoryStore::new();
        let user = store.create_user("a@b.com", "hash").await?;

        assert!(store.upgrade_user(user.id).await?);
        assert!(!store.upgrade_user(Identity::new(Uuid::new_v4())).await?);

        let found = store
            .find_user_by_email("a@b.com")
            .await?
            .context("user should exist")?;
        assert!(found.is_chirpy_red);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_token_hash_is_unique() -> Result<()> {
        let store = MemoryStore::new();
        let user_id = Identity::new(Uuid::new_v4());
        store.store_refresh_token(&record("h1", user_id)).await?;
        let result = store.store_refresh_token(&record("h1", user_id)).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        Ok(())
    }

    #[tokio::test]
    async fn revocation_keeps_first_timestamp() -> Result<()> {
        let store = MemoryStore::new();
        let user_id = Identity::new(Uuid::new_v4());
        store.store_refresh_token(&record("h1", user_id)).await?;

        let first = Utc::now();
        let later = first + Duration::minutes(5);
        assert!(store.mark_refresh_token_revoked("h1", first).await?);
        assert!(store.mark_refresh_token_revoked("h1", later).await?);
        assert!(!store.mark_refresh_token_revoked("missing", later).await?);

        let stored = store
            .find_refresh_token("h1")
            .await?
            .context("record should exist")?;
        assert_eq!(stored.revoked_at, Some(first));
        Ok(())
    }
}
