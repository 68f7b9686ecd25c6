/// Refresh Token Rotation
///
/// A refresh token moves through:
///
/// ```text
/// Issued --rotate--> Rotated (absent, replaced by a new Issued token)
///    \----revoke---> Revoked (absent, no replacement)
/// ```
///
/// A token is honoured only while it is both present in the ledger and
/// signature-valid. Consumption uses the ledger's conditional delete, so a
/// token yields at most one new pair even under concurrent presentation.

use uuid::Uuid;

use crate::auth::jwt::TokenIssuer;
use crate::auth::refresh_token::TokenLedger;
use crate::error::{AppError, AuthError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mint an access token and a ledger-backed refresh token for `user_id`
pub async fn issue_token_pair(
    issuer: &TokenIssuer,
    ledger: &dyn TokenLedger,
    user_id: Uuid,
) -> Result<TokenPair, AppError> {
    let access_token = issuer.issue_access_token(user_id)?;
    let refresh_token = issuer.issue_refresh_token(ledger, user_id).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Exchange a refresh token for a new pair, consuming the presented one
///
/// # Errors
/// - `MissingRefreshToken`: nothing (or only whitespace) was presented
/// - `InvalidRefreshToken`: not in the ledger (never issued, rotated, revoked,
///   or consumed by a concurrent request)
/// - `ExpiredRefreshToken`: in the ledger but expired or badly signed
pub async fn rotate_refresh_token(
    issuer: &TokenIssuer,
    ledger: &dyn TokenLedger,
    presented: Option<&str>,
) -> Result<TokenPair, AppError> {
    let token = require_token(presented)?;

    let record = ledger
        .find(token)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

    let claims = match issuer.verify_refresh_token(token) {
        Ok(claims) => claims,
        Err(rejection) => {
            // Can never verify again; drop it now rather than waiting for the sweep.
            ledger.delete_by_token(token).await?;
            tracing::info!(
                user_id = %record.user_id,
                reason = %rejection,
                "Refused refresh token, removed from ledger"
            );
            return Err(AuthError::ExpiredRefreshToken.into());
        }
    };

    let user_id = claims.user_id()?;
    if user_id != record.user_id {
        tracing::warn!(
            claimed = %user_id,
            owner = %record.user_id,
            "Refresh token subject does not match ledger owner"
        );
        return Err(AuthError::InvalidRefreshToken.into());
    }

    if !ledger.delete_by_token(token).await? {
        tracing::warn!(user_id = %user_id, "Refresh token consumed by a concurrent request");
        return Err(AuthError::InvalidRefreshToken.into());
    }

    let pair = issue_token_pair(issuer, ledger, user_id).await?;
    tracing::info!(user_id = %user_id, "Refresh token rotated");

    Ok(pair)
}

/// Remove a refresh token from the ledger without replacement
pub async fn revoke_refresh_token(
    ledger: &dyn TokenLedger,
    presented: Option<&str>,
) -> Result<(), AppError> {
    let token = require_token(presented)?;

    if !ledger.delete_by_token(token).await? {
        return Err(AuthError::InvalidRefreshToken.into());
    }

    Ok(())
}

fn require_token(presented: Option<&str>) -> Result<&str, AuthError> {
    presented
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingRefreshToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::memory::InMemoryTokenLedger;
    use secrecy::Secret;
    use std::sync::Arc;

    fn settings() -> JwtSettings {
        JwtSettings {
            access_token_secret: Some(Secret::new("access-secret-for-tests".to_string())),
            refresh_token_secret: Some(Secret::new("refresh-secret-for-tests".to_string())),
            access_token_expiry: 86_400,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&settings()).unwrap()
    }

    fn assert_auth_error(result: Result<TokenPair, AppError>, expected: AuthError) {
        match result {
            Err(AppError::Auth(err)) => assert_eq!(
                std::mem::discriminant(&err),
                std::mem::discriminant(&expected)
            ),
            other => panic!("Expected {:?}, got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn test_rotation_consumes_old_token() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();
        let user_id = Uuid::new_v4();
        let original = issue_token_pair(&issuer, &ledger, user_id).await.unwrap();

        let rotated = rotate_refresh_token(&issuer, &ledger, Some(&original.refresh_token))
            .await
            .unwrap();

        assert_ne!(rotated.refresh_token, original.refresh_token);
        assert!(ledger.find(&original.refresh_token).await.unwrap().is_none());
        assert!(ledger.find(&rotated.refresh_token).await.unwrap().is_some());
        assert_eq!(ledger.len().await, 1);

        let claims = issuer.verify_access_token(&rotated.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_replayed_token_is_invalid() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();
        let pair = issue_token_pair(&issuer, &ledger, Uuid::new_v4()).await.unwrap();

        rotate_refresh_token(&issuer, &ledger, Some(&pair.refresh_token))
            .await
            .unwrap();
        let replay = rotate_refresh_token(&issuer, &ledger, Some(&pair.refresh_token)).await;

        assert_auth_error(replay, AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_signature_valid_but_absent_token_is_invalid() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();
        let other_ledger = InMemoryTokenLedger::default();
        let token = issuer
            .issue_refresh_token(&other_ledger, Uuid::new_v4())
            .await
            .unwrap();

        let result = rotate_refresh_token(&issuer, &ledger, Some(&token)).await;
        assert_auth_error(result, AuthError::InvalidRefreshToken);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();

        assert_auth_error(
            rotate_refresh_token(&issuer, &ledger, None).await,
            AuthError::MissingRefreshToken,
        );
        assert_auth_error(
            rotate_refresh_token(&issuer, &ledger, Some("  ")).await,
            AuthError::MissingRefreshToken,
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_refused_and_dropped() {
        let mut config = settings();
        config.refresh_token_expiry = -120;
        let expired_issuer = TokenIssuer::new(&config).unwrap();
        let ledger = InMemoryTokenLedger::default();
        let token = expired_issuer
            .issue_refresh_token(&ledger, Uuid::new_v4())
            .await
            .unwrap();

        let result = rotate_refresh_token(&issuer(), &ledger, Some(&token)).await;

        assert_auth_error(result, AuthError::ExpiredRefreshToken);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_ledger_present_garbage_is_expired_or_invalid() {
        let ledger = InMemoryTokenLedger::default();
        ledger.insert("not-a-jwt", Uuid::new_v4()).await.unwrap();

        let result = rotate_refresh_token(&issuer(), &ledger, Some("not-a-jwt")).await;
        assert_auth_error(result, AuthError::ExpiredRefreshToken);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_succeeds_once() {
        let issuer = Arc::new(issuer());
        let ledger = Arc::new(InMemoryTokenLedger::default());
        let pair = issue_token_pair(&issuer, ledger.as_ref(), Uuid::new_v4())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let issuer = issuer.clone();
            let ledger = ledger.clone();
            let token = pair.refresh_token.clone();
            handles.push(tokio::spawn(async move {
                rotate_refresh_token(&issuer, ledger.as_ref(), Some(&token)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_removes_token() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();
        let pair = issue_token_pair(&issuer, &ledger, Uuid::new_v4()).await.unwrap();

        revoke_refresh_token(&ledger, Some(&pair.refresh_token))
            .await
            .unwrap();

        assert!(revoke_refresh_token(&ledger, Some(&pair.refresh_token)).await.is_err());
        assert_auth_error(
            rotate_refresh_token(&issuer, &ledger, Some(&pair.refresh_token)).await,
            AuthError::InvalidRefreshToken,
        );
    }
}
