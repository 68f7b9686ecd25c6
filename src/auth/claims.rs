/// JWT Claims structure
///
/// Payload shared by access and refresh tokens: the subject's identity plus
/// standard registered claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User ID as UUID string
    pub id: String,
    /// Token ID, unique per minted token
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims for `user_id` expiring `expiry_seconds` from now
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + expiry_seconds,
            iss: issuer.to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A signed token carrying a non-UUID subject is treated as an invalid token.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.id).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}
