//! Explicitly constructed auth configuration, handed to every component.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use super::{refresh_token::DEFAULT_REFRESH_TOKEN_LIFETIME, session_token::DEFAULT_LIFETIME};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    polka_key: Option<SecretString>,
    session_ttl: Duration,
    refresh_token_ttl: Duration,
    conceal_unknown_email: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            polka_key: None,
            session_ttl: DEFAULT_LIFETIME,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_LIFETIME,
            conceal_unknown_email: false,
        }
    }

    #[must_use]
    pub fn with_polka_key(mut self, key: SecretString) -> Self {
        self.polka_key = Some(key);
        self
    }

    /// Default and maximum session lifetime. Zero is ignored.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.session_ttl = ttl;
        }
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.refresh_token_ttl = ttl;
        }
        self
    }

    /// Answer unknown emails at login with `401` instead of `404`.
    #[must_use]
    pub fn with_conceal_unknown_email(mut self, conceal: bool) -> Self {
        self.conceal_unknown_email = conceal;
        self
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    /// `None` when no webhook key is configured.
    #[must_use]
    pub fn polka_key(&self) -> Option<&[u8]> {
        self.polka_key
            .as_ref()
            .map(|key| key.expose_secret().as_bytes())
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    #[must_use]
    pub fn conceal_unknown_email(&self) -> bool {
        self.conceal_unknown_email
    }
}
