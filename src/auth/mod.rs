//! Session and authorization core.
//!
//! - [`password`]: Argon2id hashing and verification of user secrets.
//! - [`session_token`]: short-lived HS256 session tokens bound to an [`Identity`].
//! - [`RefreshTokens`]: long-lived opaque tokens persisted by digest, revocable.
//! - [`extract_bearer`] / [`extract_api_key`]: strict `Authorization` parsing.
//! - [`AuthGate`]: ordered stage pipeline that yields a [`VerifiedIdentity`].
//!
//! Every component receives its configuration and [`Clock`] explicitly.

mod clock;
mod config;
mod credentials;
mod error;
mod gate;
mod identity;
pub mod password;
mod refresh_token;
pub mod session_token;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use credentials::{API_KEY_SCHEME, BEARER_SCHEME, extract_api_key, extract_bearer};
pub use error::AuthError;
pub use gate::{
    AuthGate, AuthenticatedRequest, BearerExtraction, Pipeline, SessionVerification, Stage,
    VerifiedIdentity, require_session,
};
pub use identity::Identity;
pub use password::{hash_password, verify_password};
pub use refresh_token::{
    DEFAULT_REFRESH_TOKEN_LIFETIME, REFRESH_TOKEN_BYTES, RefreshTokens, generate_refresh_token,
    hash_refresh_token,
};
pub use session_token::SessionTokens;
pub use state::{AuthState, LoginOutcome, normalize_email};
