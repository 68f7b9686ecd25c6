/// In-process stores
///
/// Drop-in replacements for the PostgreSQL stores, used for local runs
/// (`application.storage: memory`) and by the test-suite. Each map sits behind
/// a single lock so check-and-mutate sequences are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::refresh_token::{hash_token, RefreshTokenRecord, TokenLedger};
use crate::error::{AppError, DatabaseError};
use crate::users::{CredentialStore, NewUser, User};

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;

        if users.values().any(|existing| existing.mobile == user.mobile) {
            return Err(DatabaseError::DuplicateMobile.into());
        }

        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            mobile: user.mobile,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_mobile(&self, mobile: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.mobile == mobile).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTokenLedger {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryTokenLedger {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn insert(&self, token: &str, user_id: Uuid) -> Result<(), AppError> {
        let token_hash = hash_token(token);
        let mut records = self.records.write().await;

        if records.contains_key(&token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_pkey".to_string(),
            )
            .into());
        }

        records.insert(
            token_hash.clone(),
            RefreshTokenRecord {
                token_hash,
                user_id,
                created_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.records.read().await.get(&hash_token(token)).cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(&hash_token(token)).is_some())
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.created_at >= cutoff);

        Ok((before - records.len()) as u64)
    }
}
