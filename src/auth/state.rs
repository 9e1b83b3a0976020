//! Shared auth state and the login flow.
//!
//! Flow Overview:
//! 1) Normalize the email and look the user up.
//! 2) Verify the password against the stored Argon2 hash.
//! 3) Issue a session token and a refresh token.

use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

use super::{
    AuthConfig, AuthError, AuthGate, Clock, RefreshTokens, SessionTokens, hash_password,
    verify_password,
};
use crate::store::{RefreshTokenStore, UserRecord, UserStore};

/// Normalize an email for lookup and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Credentials returned by a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthState {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    sessions: SessionTokens,
    refresh_tokens: RefreshTokens,
    gate: AuthGate,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionTokens::new(config.token_secret().clone(), clock.clone())
            .with_lifetimes(config.session_ttl(), config.session_ttl());
        let refresh_tokens =
            RefreshTokens::new(refresh_store, clock).with_lifetime(config.refresh_token_ttl());
        let gate = AuthGate::new(sessions.clone());
        Self {
            config,
            users,
            sessions,
            refresh_tokens,
            gate,
        }
    }

    /// Build the state over one store implementing both capabilities.
    #[must_use]
    pub fn with_store<S>(config: AuthConfig, store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: UserStore + RefreshTokenStore + 'static,
    {
        Self::new(config, store.clone(), store, clock)
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionTokens {
        &self.sessions
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &RefreshTokens {
        &self.refresh_tokens
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Hash the password and create the user.
    ///
    /// # Errors
    ///
    /// [`AuthError::Hash`] or a store failure; a taken email surfaces as
    /// `AuthError::Store(StoreError::Conflict)`.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(&normalize_email(email), &password_hash)
            .await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Verify credentials and issue a session token plus a refresh token.
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownUser`] for an unregistered email (or
    /// [`AuthError::InvalidCredentials`] when unknown emails are concealed),
    /// [`AuthError::InvalidCredentials`] for a wrong password, and signing,
    /// entropy or store failures.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        requested_lifetime: Option<Duration>,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self
            .users
            .find_user_by_email(&normalize_email(email))
            .await?
        else {
            debug!("Login for unknown email");
            return Err(if self.config.conceal_unknown_email() {
                AuthError::InvalidCredentials
            } else {
                AuthError::UnknownUser
            });
        };

        if !verify_password(&user.password_hash, password) {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.sessions.issue(user.id, requested_lifetime)?;
        let refresh_token = self.refresh_tokens.issue(user.id).await?;
        info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            user,
            token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new session token.
    ///
    /// # Errors
    ///
    /// See [`RefreshTokens::exchange`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.refresh_tokens
            .exchange(refresh_token, &self.sessions)
            .await
    }

    /// Revoke a refresh token; unknown tokens are not an error here.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        match self.refresh_tokens.revoke(refresh_token).await {
            Ok(()) | Err(AuthError::RefreshTokenNotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("refresh_tokens", &self.refresh_tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ManualClock;
    use crate::store::{MemoryStore, StoreError};
    use anyhow::Result;
    use secrecy::SecretString;

    fn state(config: AuthConfig) -> (AuthState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (AuthState::with_store(config, store, clock.clone()), clock)
    }

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("state-secret".to_string()))
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }

    #[tokio::test]
    async fn register_then_login() -> Result<()> {
        let (state, _) = state(config());
        let user = state.register(" A@B.com", "pw123").await?;
        assert_eq!(user.email, "a@b.com");
        assert_ne!(user.password_hash, "pw123");

        let outcome = state.login("a@b.com", "pw123", None).await?;
        assert_eq!(outcome.user.id, user.id);
        assert_eq!(state.sessions().validate(&outcome.token)?, user.id);
        assert!(!state.refresh(&outcome.refresh_token).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() -> Result<()> {
        let (state, _) = state(config());
        state.register("a@b.com", "pw123").await?;
        let result = state.register("A@B.COM", "other").await;
        assert!(matches!(result, Err(AuthError::Store(StoreError::Conflict))));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() -> Result<()> {
        let (state, _) = state(config());
        state.register("a@b.com", "pw123").await?;
        let result = state.login("a@b.com", "wrong", None).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_respects_concealment() {
        let (open, _) = state(config());
        let result = open.login("nobody@b.com", "pw", None).await;
        assert!(matches!(result, Err(AuthError::UnknownUser)));

        let (concealed, _) = state(config().with_conceal_unknown_email(true));
        let result = concealed.login("nobody@b.com", "pw", None).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn requested_lifetime_is_clamped_to_session_ttl() -> Result<()> {
        let (state, clock) = state(config().with_session_ttl(Duration::from_secs(60)));
        state.register("a@b.com", "pw123").await?;
        let outcome = state
            .login("a@b.com", "pw123", Some(Duration::from_secs(3600)))
            .await?;

        clock.advance(chrono::Duration::seconds(59));
        assert!(state.sessions().validate(&outcome.token).is_ok());
        clock.advance(chrono::Duration::seconds(1));
        assert!(matches!(
            state.sessions().validate(&outcome.token),
            Err(AuthError::Expired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_ignores_unknown_tokens() -> Result<()> {
        let (state, _) = state(config());
        state.register("a@b.com", "pw123").await?;
        let outcome = state.login("a@b.com", "pw123", None).await?;

        state.revoke(&outcome.refresh_token).await?;
        state.revoke(&outcome.refresh_token).await?;
        state.revoke("unknown").await?;
        assert!(matches!(
            state.refresh(&outcome.refresh_token).await,
            Err(AuthError::RefreshTokenRevoked)
        ));
        Ok(())
    }
}
