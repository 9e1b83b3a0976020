use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

/// Failures raised by the auth core.
///
/// Callers only ever see two outcomes, unauthorized or internal error. The
/// variants exist so logs can tell an integrity failure from an expired token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("refresh token revoked")]
    RefreshTokenRevoked,
    #[error("unknown user")]
    UnknownUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no credential configured for this endpoint")]
    CredentialNotConfigured,
    #[error("password hashing failed")]
    Hash,
    #[error("token signing failed")]
    Signing,
    #[error("entropy source failure")]
    Entropy,
    #[error("store failure")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the failure is an authorization decision rather than a fault.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        !matches!(
            self,
            Self::Hash | Self::Signing | Self::Entropy | Self::Store(_)
        )
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownUser => StatusCode::NOT_FOUND,
            _ if self.is_unauthorized() => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::NOT_FOUND => "User not found",
            _ => "Internal Server Error",
        };
        (status, message.to_string()).into_response()
    }
}
