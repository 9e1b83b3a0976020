//! Identity probe behind the authentication gate.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, VerifiedIdentity};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub id: Identity,
}

#[utoipa::path(
    get,
    path= "/api/me",
    responses (
        (status = 200, description = "Identity proven by the session token", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired session token"),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
pub async fn me(identity: VerifiedIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        id: identity.identity(),
    })
}
