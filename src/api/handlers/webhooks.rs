//! Payment provider (Polka) webhook.
//!
//! The provider authenticates with `Authorization: ApiKey <key>`. Only
//! `user.upgraded` events change state; anything else is acknowledged with `204`
//! so the provider stops retrying.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth_failure;
use crate::auth::{AuthError, AuthState, Identity, extract_api_key};

pub const USER_UPGRADED: &str = "user.upgraded";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PolkaWebhook {
    pub event: String,
    pub data: PolkaWebhookData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PolkaWebhookData {
    pub user_id: Uuid,
}

fn authorize(headers: &HeaderMap, expected: Option<&[u8]>) -> Result<(), AuthError> {
    let expected = expected.ok_or(AuthError::CredentialNotConfigured)?;
    let presented = extract_api_key(headers)?;
    if bool::from(presented.as_bytes().ct_eq(expected)) {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

#[utoipa::path(
    post,
    path= "/api/polka/webhooks",
    request_body = PolkaWebhook,
    responses (
        (status = 204, description = "Event processed or ignored"),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "User not found"),
    ),
    security(("api_key" = [])),
    tag= "webhooks"
)]
#[instrument(skip_all)]
pub async fn polka_webhook(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Result<Json<PolkaWebhook>, JsonRejection>,
) -> Response {
    if let Err(err) = authorize(&headers, state.config().polka_key()) {
        return auth_failure("polka_webhook", err);
    }

    let webhook = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Invalid payload: {rejection}");
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    if webhook.event != USER_UPGRADED {
        debug!(event = %webhook.event, "Ignoring webhook event");
        return StatusCode::NO_CONTENT.into_response();
    }

    let user_id = Identity::new(webhook.data.user_id);
    match state.users().upgrade_user(user_id).await {
        Ok(true) => {
            info!(%user_id, "User upgraded to Chirpy Red");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
        Err(err) => {
            error!("Error upgrading user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
