//! Refresh token exchange and revocation.
//!
//! Both endpoints take the raw refresh token as `Authorization: Bearer <token>`.
//! Revocation answers `204` whether or not the token existed; only a missing or
//! malformed header is rejected.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::auth_failure;
use crate::auth::{AuthState, extract_bearer};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path= "/api/refresh",
    responses (
        (status = 200, description = "New session token", body = RefreshResponse, content_type = "application/json"),
        (status = 401, description = "Missing, unknown, expired or revoked refresh token"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let refresh_token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(err) => return auth_failure("refresh", err),
    };

    match state.refresh(&refresh_token).await {
        Ok(token) => (StatusCode::OK, Json(RefreshResponse { token })).into_response(),
        Err(err) => auth_failure("refresh", err),
    }
}

#[utoipa::path(
    post,
    path= "/api/revoke",
    responses (
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Missing or malformed authorization header"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn revoke(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let refresh_token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(err) => return auth_failure("revoke", err),
    };

    match state.revoke(&refresh_token).await {
        Ok(()) => {
            debug!("Refresh token revoked");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => auth_failure("revoke", err),
    }
}
