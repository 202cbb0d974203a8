//! PostgreSQL-backed user store.

use async_trait::async_trait;
use atelier_core::{OpenId, Result};
use atelier_platform_access::{Role, StoreError, User, UserStore, UserUpsert};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    login_method: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    last_signed_in: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = OpenId::new(self.id.clone()).map_err(|e| StoreError::InvalidRecord {
            id: self.id.clone(),
            details: e.to_string(),
        })?;
        let role = Role::from_str(&self.role).map_err(|details| StoreError::InvalidRecord {
            id: self.id.clone(),
            details,
        })?;
        Ok(User::with_all_fields(
            id,
            self.name,
            self.email,
            self.login_method,
            role,
            self.created_at,
            self.last_signed_in,
        ))
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Database {
        details: e.to_string(),
    }
}

/// User store over the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user(&self, id: &OpenId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, login_method, role, created_at, last_signed_in
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn upsert_user(&self, upsert: UserUpsert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, login_method, role, created_at, last_signed_in)
            VALUES ($1, $2, $3, $4, COALESCE($5, 'user'), now(), COALESCE($6, now()))
            ON CONFLICT (id) DO UPDATE SET
                name = COALESCE($2, users.name),
                email = COALESCE($3, users.email),
                login_method = COALESCE($4, users.login_method),
                role = COALESCE($5, users.role),
                last_signed_in = COALESCE($6, users.last_signed_in)
            "#,
        )
        .bind(upsert.id.as_str())
        .bind(upsert.name)
        .bind(upsert.email)
        .bind(upsert.login_method)
        .bind(upsert.role.map(|r| r.as_str()))
        .bind(upsert.last_signed_in)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }
}
