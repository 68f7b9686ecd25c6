/// Credential Store
///
/// Users are identified by a generated UUID and a unique mobile number.
/// Only the bcrypt hash of the password is ever persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub mobile: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Validated registration data, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub mobile: String,
    pub password_hash: String,
}

/// Public view of a user, safe to return to clients
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub mobile: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            mobile: user.mobile.clone(),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new user
    ///
    /// # Errors
    /// `DatabaseError::DuplicateMobile` when the mobile number is already registered
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_by_mobile(&self, mobile: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

/// PostgreSQL-backed store over the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            mobile: user.mobile,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, mobile, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::UniqueConstraintViolation(_) => DatabaseError::DuplicateMobile,
            other => other,
        })?;

        Ok(user)
    }

    async fn find_by_mobile(&self, mobile: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, mobile, password_hash, created_at FROM users WHERE mobile = $1",
        )
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, mobile, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
