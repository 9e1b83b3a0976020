//! PostgreSQL-backed store. Schema lives in `sql/schema.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span, instrument};
use uuid::Uuid;

use super::{RefreshTokenRecord, RefreshTokenStore, StoreError, UserRecord, UserStore};
use crate::auth::Identity;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: Identity::new(row.get::<Uuid, _>("id")),
        email: row.get("email"),
        password_hash: row.get("hashed_password"),
        is_chirpy_red: row.get("is_chirpy_red"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self, password_hash))]
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRecord, StoreError> {
        let query = r"
            INSERT INTO users (id, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING id, email, hashed_password, is_chirpy_red, created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        Ok(user_from_row(&row))
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = r"
            SELECT id, email, hashed_password, is_chirpy_red, created_at, updated_at
            FROM users WHERE email = $1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    #[instrument(skip(self))]
    async fn upgrade_user(&self, id: Identity) -> Result<bool, StoreError> {
        let query = "UPDATE users SET is_chirpy_red = TRUE, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $3, $4)
        ";
        sqlx::query(query)
            .bind(&record.token_hash)
            .bind(record.user_id.as_uuid())
            .bind(record.created_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = r"
            SELECT token_hash, user_id, created_at, expires_at, revoked_at
            FROM refresh_tokens WHERE token_hash = $1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        Ok(row.map(|row| RefreshTokenRecord {
            token_hash: row.get("token_hash"),
            user_id: Identity::new(row.get::<Uuid, _>("user_id")),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            revoked_at: row.get("revoked_at"),
        }))
    }

    #[instrument(skip_all)]
    async fn mark_refresh_token_revoked(
        &self,
        token_hash: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // Single-row update; concurrent revocations keep the first timestamp.
        let query = r"
            UPDATE refresh_tokens
            SET revoked_at = COALESCE(revoked_at, $2), updated_at = $2
            WHERE token_hash = $1
        ";
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(revoked_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
