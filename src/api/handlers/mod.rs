//! API handlers and shared helpers.

pub mod health;
pub mod login;
pub mod me;
pub mod refresh;
pub mod users;
pub mod webhooks;

use axum::response::{IntoResponse, Response};
use regex::Regex;
use tracing::{debug, error};

use crate::auth::AuthError;

/// Lightweight email sanity check on already-normalized input.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Log an auth failure at the level it deserves and turn it into a response.
pub(crate) fn auth_failure(action: &'static str, err: AuthError) -> Response {
    if err.is_unauthorized() {
        debug!(action, "Rejected: {err}");
    } else {
        error!(action, "Failed: {err}");
    }
    err.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("a@b.com"));
        assert!(valid_email("first.last@sub.example.org"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        for email in ["", "a@b", "@b.com", "a.com", "a @b.com", "a@b@c.com"] {
            assert!(!valid_email(email), "{email} should be rejected");
        }
    }

    #[test]
    fn auth_failure_keeps_status() {
        assert_eq!(
            auth_failure("test", AuthError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_failure("test", AuthError::Signing).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
