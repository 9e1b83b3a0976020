//! Strict single-token credential extraction from the `Authorization` header.
//!
//! The grammar is `<Scheme> <token>` with exactly one space and a token without
//! whitespace. This is deliberately narrower than RFC 9110 auth-scheme parsing.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use super::AuthError;

pub const BEARER_SCHEME: &str = "Bearer";
pub const API_KEY_SCHEME: &str = "ApiKey";

/// Extract a `Bearer` token.
///
/// # Errors
///
/// Returns [`AuthError::MalformedCredential`] when the header is missing, repeated,
/// not visible ASCII, uses another scheme, or carries anything but one token.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_scheme(headers, BEARER_SCHEME)
}

/// Extract an `ApiKey` credential used by trusted services.
///
/// # Errors
///
/// Same as [`extract_bearer`].
pub fn extract_api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    extract_scheme(headers, API_KEY_SCHEME)
}

fn extract_scheme(headers: &HeaderMap, scheme: &str) -> Result<String, AuthError> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let value = values
        .next()
        .ok_or(AuthError::MalformedCredential("missing authorization header"))?;
    if values.next().is_some() {
        return Err(AuthError::MalformedCredential(
            "multiple authorization headers",
        ));
    }

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedCredential("non-ascii authorization header"))?;
    let token = value
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or(AuthError::MalformedCredential("unexpected scheme"))?;

    if token.is_empty() {
        return Err(AuthError::MalformedCredential("empty token"));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(AuthError::MalformedCredential("token contains whitespace"));
    }

    Ok(token.to_string())
}
