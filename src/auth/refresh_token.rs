/// Refresh Token Ledger
///
/// The ledger is the set of refresh tokens that may still be exchanged.
/// A signed refresh token is only honoured while its record is present here:
/// - Tokens are keyed by their SHA-256 digest (never store plaintext)
/// - `delete_by_token` is an atomic conditional delete; exactly one caller wins
/// - Records older than the refresh-token lifetime are swept periodically

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// A refresh token currently held in the ledger
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Persistence contract for outstanding refresh tokens
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Record a freshly issued token. Fails if the token is already present.
    async fn insert(&self, token: &str, user_id: Uuid) -> Result<(), AppError>;

    async fn find(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Remove the token if present. Returns `true` only for the call that removed it.
    async fn delete_by_token(&self, token: &str) -> Result<bool, AppError>;

    /// Remove every record created before `cutoff`, returning how many were dropped.
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Hash a refresh token using SHA-256
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// PostgreSQL-backed ledger over the `refresh_tokens` table
#[derive(Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn insert(&self, token: &str, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(hash_token(token))
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token_hash, user_id, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Periodically drop ledger records older than `max_age`.
///
/// Their signatures have expired, so they can no longer be rotated; without the
/// sweep they would only disappear when someone presents them again.
pub fn spawn_ledger_sweeper(
    ledger: Arc<dyn TokenLedger>,
    max_age: Duration,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - max_age;

            match ledger.purge_created_before(cutoff).await {
                Ok(0) => tracing::debug!("Ledger sweep found no stale refresh tokens"),
                Ok(purged) => tracing::info!(purged, "Swept stale refresh tokens"),
                Err(e) => tracing::error!(error = %e, "Ledger sweep failed"),
            }
        }
    })
}
