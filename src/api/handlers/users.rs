use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{auth_failure, valid_email};
use crate::{
    auth::{AuthError, AuthState, Identity, normalize_email},
    store::{StoreError, UserRecord},
};

#[derive(ToSchema, Deserialize)]
pub struct CreateUser {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub is_chirpy_red: bool,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            email: user.email,
            is_chirpy_red: user.is_chirpy_red,
        }
    }
}

#[utoipa::path(
    post,
    path= "/api/users",
    request_body = CreateUser,
    responses (
        (status = 201, description = "User created", body = UserResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload, invalid email or empty password"),
        (status = 409, description = "User with the specified email already exists"),
    ),
    tag= "users"
)]
#[instrument(skip(state, payload))]
pub async fn create_user(
    state: Extension<Arc<AuthState>>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> Response {
    let user = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Invalid payload: {rejection}");
            return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
        }
    };

    let email = normalize_email(&user.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if user.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    match state.register(&email, &user.password).await {
        Ok(record) => (StatusCode::CREATED, Json(UserResponse::from(record))).into_response(),
        Err(AuthError::Store(StoreError::Conflict)) => {
            debug!("User already exists");
            (StatusCode::CONFLICT, "User already exists".to_string()).into_response()
        }
        Err(err) => auth_failure("create_user", err),
    }
}
