//! # Chirpy (session & authorization service)
//!
//! `chirpy` issues, validates and revokes the credentials that gate write access
//! to the Chirpy content service, and hands a verified identity to request
//! handlers.
//!
//! ## Credentials
//!
//! - **Session tokens** are short-lived HS256 JWTs. They are stateless: the server
//!   keeps no record of them and they cannot be revoked before `exp`.
//! - **Refresh tokens** are 256-bit random strings persisted by SHA-256 digest with
//!   an expiry (60 days) and a revocation timestamp. Exchanging one mints a new
//!   session token; the refresh token itself is not rotated.
//! - **Passwords** are stored as Argon2id PHC strings with a fresh salt per hash.
//!
//! ## Authentication Gate
//!
//! Protected routes run behind [`auth::AuthGate`], an ordered pipeline that
//! extracts the `Bearer` credential and verifies the session token. Handlers read
//! the result through [`auth::VerifiedIdentity`], which only the gate can build.
//! The gate never touches the store.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}
