/// Authentication Routes
///
/// Registration, login, refresh-token rotation, logout and the current user.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    issue_token_pair, revoke_refresh_token, rotate_refresh_token, verify_credentials, Claims,
    PasswordHasher, TokenIssuer, TokenLedger, Verification,
};
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext};
use crate::users::{CredentialStore, NewUser, UserSummary};
use crate::validators::{require_login_fields, validate_registration};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub mobile: Option<String>,
    pub password: Option<String>,
}

/// Refresh and logout request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub data: RegisteredUser,
}

/// Login response. The access token is exposed as `token` here but as
/// `accessToken` by `/refresh`; existing clients depend on both names.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /register
///
/// # Errors
/// - 400: Field validation errors (`errors` map) or mobile already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    credentials: web::Data<dyn CredentialStore>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let registration = validate_registration(
        form.name.as_deref(),
        form.mobile.as_deref(),
        form.password.as_deref(),
    )?;
    let password_hash = hasher.hash(registration.password).await?;

    let user = credentials
        .insert(NewUser {
            name: registration.name.to_string(),
            mobile: registration.mobile.to_string(),
            password_hash,
        })
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(RegisterResponse {
        success: true,
        data: RegisteredUser {
            id: user.id.to_string(),
            name: user.name,
            mobile: user.mobile,
            created_at: user.created_at.to_rfc3339(),
        },
    }))
}

/// POST /login
///
/// # Errors
/// - 400: Missing fields, unknown mobile (`errors.mobile`) or wrong password
///   (`errors.password`); never both
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    credentials: web::Data<dyn CredentialStore>,
    ledger: web::Data<dyn TokenLedger>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let (mobile, password) =
        require_login_fields(form.mobile.as_deref(), form.password.as_deref())?;

    let user = match verify_credentials(credentials.get_ref(), mobile, password).await {
        Verification::Valid(user) => user,
        Verification::NoSuchUser => return Err(AuthError::UnknownMobile.into()),
        Verification::WrongPassword => return Err(AuthError::WrongPassword.into()),
    };

    let pair = issue_token_pair(issuer.get_ref(), ledger.get_ref(), user.id).await?;

    let context = context.with_user_id(user.id.to_string());
    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: UserSummary::from(&user),
        token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /refresh
///
/// Exchanges a refresh token for a new access/refresh pair. The presented
/// token is removed from the ledger before the response is produced, so
/// presenting it again fails.
///
/// # Errors
/// - 400: `refreshToken` missing
/// - 403: Token unknown, already rotated, revoked, expired or tampered with
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    ledger: web::Data<dyn TokenLedger>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let pair = rotate_refresh_token(
        issuer.get_ref(),
        ledger.get_ref(),
        form.refresh_token.as_deref(),
    )
    .await?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");

    Ok(HttpResponse::Ok().json(RefreshResponse {
        message: "Token refreshed".to_string(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /logout
///
/// Revokes a refresh token without issuing a replacement.
///
/// # Errors
/// - 400: `refreshToken` missing
/// - 403: Token not in the ledger
pub async fn logout(
    form: web::Json<RefreshRequest>,
    ledger: web::Data<dyn TokenLedger>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_revocation");

    revoke_refresh_token(ledger.get_ref(), form.refresh_token.as_deref()).await?;

    tracing::info!(request_id = %context.request_id, "Refresh token revoked");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// GET /api/me
///
/// **Requires a valid access token**; claims are injected by `JwtMiddleware`.
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    credentials: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = credentials
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserSummary::from(&user)))
}
