//! Password login.
//!
//! Flow Overview:
//! 1) Parse `{email, password, expires_in_seconds?}`.
//! 2) Verify the password through [`AuthState::login`].
//! 3) Return the user with a session token and a refresh token.
//!
//! A missing, zero or negative `expires_in_seconds` gets the default session
//! lifetime, and so does anything above the maximum.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::auth_failure;
use crate::auth::{AuthState, Identity, LoginOutcome};

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
    #[serde(default)]
    expires_in_seconds: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub id: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub is_chirpy_red: bool,
    pub token: String,
    pub refresh_token: String,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            id: outcome.user.id,
            created_at: outcome.user.created_at,
            updated_at: outcome.user.updated_at,
            email: outcome.user.email,
            is_chirpy_red: outcome.user.is_chirpy_red,
            token: outcome.token,
            refresh_token: outcome.refresh_token,
        }
    }
}

fn requested_lifetime(expires_in_seconds: Option<i64>) -> Option<Duration> {
    expires_in_seconds
        .and_then(|seconds| u64::try_from(seconds).ok())
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Unknown email"),
    ),
    tag= "auth"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Invalid payload: {rejection}");
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    match state
        .login(
            &request.email,
            &request.password,
            requested_lifetime(request.expires_in_seconds),
        )
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(LoginResponse::from(outcome))).into_response(),
        Err(err) => auth_failure("login", err),
    }
}
