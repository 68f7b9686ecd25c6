/// JWT Token Issuance and Verification
///
/// Access and refresh tokens are HS256 JWTs signed with separate secrets.
/// Access tokens are verified statelessly; refresh tokens are additionally
/// recorded in the ledger when minted.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::refresh_token::TokenLedger;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

/// Why a presented token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token has expired")]
    Expired,
    #[error("token signature or format is invalid")]
    Invalid,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Mints and verifies the service's signed tokens
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKey,
    refresh: SigningKey,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    issuer: String,
}

impl TokenIssuer {
    /// Build an issuer from configuration
    ///
    /// # Errors
    /// Returns error if either signing secret is missing, blank, or both are equal
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        let (access_secret, refresh_secret) = config.secrets()?;

        Ok(Self {
            access: SigningKey::from_secret(access_secret),
            refresh: SigningKey::from_secret(refresh_secret),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
        })
    }

    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    /// Sign a short-lived access token for `user_id`
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(user_id, self.access_token_expiry, &self.access)
    }

    /// Sign a refresh token for `user_id` and record it in the ledger
    ///
    /// The token is only returned once the ledger insert has succeeded.
    pub async fn issue_refresh_token(
        &self,
        ledger: &dyn TokenLedger,
        user_id: Uuid,
    ) -> Result<String, AppError> {
        let token = self.sign(user_id, self.refresh_token_expiry, &self.refresh)?;
        ledger.insert(&token, user_id).await?;

        tracing::debug!(user_id = %user_id, "Refresh token recorded in ledger");
        Ok(token)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenRejection> {
        self.verify(token, &self.access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenRejection> {
        self.verify(token, &self.refresh)
    }

    fn sign(&self, user_id: Uuid, expiry: i64, key: &SigningKey) -> Result<String, AppError> {
        let claims = Claims::new(user_id, expiry, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn verify(&self, token: &str, key: &SigningKey) -> Result<Claims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        decode::<Claims>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenRejection::Expired,
                    _ => TokenRejection::Invalid,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTokenLedger;
    use secrecy::Secret;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_token_secret: Some(Secret::new("access-secret-for-tests".to_string())),
            refresh_token_secret: Some(Secret::new("refresh-secret-for-tests".to_string())),
            access_token_expiry: 86_400,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&get_test_config()).expect("Failed to build issuer")
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let token = issuer.issue_access_token(user_id).expect("Failed to generate token");
        let claims = issuer.verify_access_token(&token).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.exp - claims.iat, 86_400);
        assert_eq!(claims.iss, "test");
    }

    #[tokio::test]
    async fn test_refresh_token_is_recorded_and_verifiable() {
        let issuer = issuer();
        let ledger = InMemoryTokenLedger::default();
        let user_id = Uuid::new_v4();

        let token = issuer
            .issue_refresh_token(&ledger, user_id)
            .await
            .expect("Failed to issue refresh token");

        let claims = issuer.verify_refresh_token(&token).expect("Failed to verify");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.exp - claims.iat, 604_800);

        let record = ledger.find(&token).await.unwrap().expect("Token not in ledger");
        assert_eq!(record.user_id, user_id);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let issuer = issuer();
        let token = issuer.issue_access_token(Uuid::new_v4()).unwrap();

        assert_eq!(issuer.verify_refresh_token(&token), Err(TokenRejection::Invalid));
    }

    #[test]
    fn test_invalid_token() {
        let result = issuer().verify_access_token("invalid.token.here");
        assert_eq!(result, Err(TokenRejection::Invalid));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = issuer();
        let token = issuer.issue_access_token(Uuid::new_v4()).unwrap();

        let tampered = format!("{}X", token);
        assert!(issuer.verify_access_token(&tampered).is_err());
    }

    #[test]
    fn test_expired_token() {
        let mut config = get_test_config();
        config.access_token_expiry = -120;
        let issuer = TokenIssuer::new(&config).unwrap();

        let token = issuer.issue_access_token(Uuid::new_v4()).unwrap();
        assert_eq!(issuer.verify_access_token(&token), Err(TokenRejection::Expired));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config)
            .unwrap()
            .issue_access_token(Uuid::new_v4())
            .unwrap();

        config.issuer = "wrong-issuer".to_string();
        let result = TokenIssuer::new(&config).unwrap().verify_access_token(&token);

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_secret_fails_fast() {
        let mut config = get_test_config();
        config.refresh_token_secret = None;

        assert!(TokenIssuer::new(&config).is_err());
    }
}
