/// Error Handling Module
///
/// One `AppError` flows through every layer of the service:
/// 1. Domain-specific error enums (validation, storage, authentication, configuration)
/// 2. Conversion from library errors (`sqlx`, JSON extraction)
/// 3. Mapping to HTTP responses with a structured JSON body
/// 4. Structured error logging with request context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::collections::BTreeMap;

/// Offending field name mapped to a human readable message.
pub type FieldErrors = BTreeMap<String, String>;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("validation failed for: {}", field_list(.0))]
    Fields(FieldErrors),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    /// Build a single-field validation error
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), message.into());
        ValidationError::Fields(errors)
    }
}

fn field_list(errors: &FieldErrors) -> String {
    errors.keys().cloned().collect::<Vec<_>>().join(", ")
}

/// Storage errors raised by the credential store and the refresh token ledger
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Mobile number already exists")]
    DuplicateMobile,
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Query error: {0}")]
    QueryExecution(String),
    #[error("Database connection error: {0}")]
    ConnectionPool(String),
    #[error("Database error: {0}")]
    UnexpectedError(String),
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateMobile | DatabaseError::UniqueConstraintViolation(_)
        )
    }
}

/// Configuration errors detected at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Authentication and token errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Mobile and password are required")]
    MissingCredentials(FieldErrors),
    #[error("Invalid mobile number")]
    UnknownMobile,
    #[error("Invalid password")]
    WrongPassword,
    #[error("Refresh token required")]
    MissingRefreshToken,
    #[error("Refresh token is unknown or already used")]
    InvalidRefreshToken,
    #[error("Refresh token expired or tampered")]
    ExpiredRefreshToken,
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid or expired access token")]
    TokenInvalid,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            // 23505 = unique_violation
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::Database(_) => DatabaseError::QueryExecution(err.to_string()),
            _ => DatabaseError::UnexpectedError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// JSON body returned for every failed request
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false`, mirrors the `success` flag of successful bodies
    pub success: bool,
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Per-field messages, present for validation and credential failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            success: false,
            error_id,
            message,
            code,
            status,
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_errors(mut self, errors: Option<FieldErrors>) -> Self {
        self.errors = errors;
        self
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

struct Rendered {
    status: StatusCode,
    code: &'static str,
    message: String,
    errors: Option<FieldErrors>,
}

impl Rendered {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            errors: None,
        }
    }

    fn errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            AppError::Validation(ValidationError::Fields(errors)) => {
                Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation error")
                    .errors(errors.clone())
            }
            AppError::Validation(ValidationError::MalformedBody(_)) => Rendered::new(
                StatusCode::BAD_REQUEST,
                "MALFORMED_BODY",
                "Malformed request body",
            ),

            AppError::Database(e) => match e {
                DatabaseError::DuplicateMobile => Rendered::new(
                    StatusCode::BAD_REQUEST,
                    "DUPLICATE_MOBILE",
                    "Mobile number already exists",
                ),
                DatabaseError::UniqueConstraintViolation(_) => {
                    Rendered::new(StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                DatabaseError::NotFound(_) => {
                    Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                DatabaseError::ConnectionPool(_) => Rendered::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable",
                ),
                _ => Rendered::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred",
                ),
            },

            AppError::Auth(e) => match e {
                AuthError::MissingCredentials(errors) => Rendered::new(
                    StatusCode::BAD_REQUEST,
                    "MISSING_CREDENTIALS",
                    "Mobile and password are required",
                )
                .errors(errors.clone()),
                AuthError::UnknownMobile => Rendered::new(
                    StatusCode::BAD_REQUEST,
                    "INVALID_CREDENTIALS",
                    "Invalid mobile or password",
                )
                .errors(single("mobile", "Invalid Mobile number")),
                AuthError::WrongPassword => Rendered::new(
                    StatusCode::BAD_REQUEST,
                    "INVALID_CREDENTIALS",
                    "Invalid password",
                )
                .errors(single("password", "Invalid Password")),
                AuthError::MissingRefreshToken => Rendered::new(
                    StatusCode::BAD_REQUEST,
                    "MISSING_REFRESH_TOKEN",
                    "Refresh token required",
                ),
                AuthError::InvalidRefreshToken => Rendered::new(
                    StatusCode::FORBIDDEN,
                    "INVALID_REFRESH_TOKEN",
                    "Invalid refresh token",
                ),
                AuthError::ExpiredRefreshToken => Rendered::new(
                    StatusCode::FORBIDDEN,
                    "EXPIRED_REFRESH_TOKEN",
                    "Token expired/invalid",
                ),
                AuthError::MissingToken => Rendered::new(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Missing or invalid authorization header",
                ),
                AuthError::TokenInvalid => Rendered::new(
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token",
                ),
            },

            AppError::Config(_) => Rendered::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error",
            ),

            AppError::Internal(_) => Rendered::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        }
    }
}

fn single(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), message.to_string());
    errors
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let rendered = self.render();
        let body = ErrorResponse::new(
            request_id.to_string(),
            rendered.message,
            rendered.code.to_string(),
            rendered.status.as_u16(),
        )
        .with_errors(rendered.errors);

        (rendered.status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(e) if e.is_unique_violation() => {
                tracing::warn!(request_id = request_id, error = %e, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e @ (AuthError::UnknownMobile | AuthError::WrongPassword)) => {
                tracing::warn!(request_id = request_id, error = %e, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.render().status
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context carried through a handler for correlated log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(error = %error, context = %context, "Request rejected");
            }
            _ => {
                tracing::error!(error = %error, context = %context, "Request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_validation_renders_errors_map() {
        let err: AppError = ValidationError::field("mobile", "Mobile is required").into();
        let (status, body) = ErrorHandler::error_response(&err, "req-1");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(
            body.errors.unwrap().get("mobile").map(String::as_str),
            Some("Mobile is required")
        );
    }

    #[test]
    fn test_duplicate_mobile_is_bad_request() {
        let err = AppError::Database(DatabaseError::DuplicateMobile);
        let (status, body) = ErrorHandler::error_response(&err, "req-2");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Mobile number already exists");
        assert!(body.errors.is_none());
    }

    #[test]
    fn test_refresh_token_failures_are_forbidden() {
        for err in [AuthError::InvalidRefreshToken, AuthError::ExpiredRefreshToken] {
            assert_eq!(AppError::Auth(err).status_code(), StatusCode::FORBIDDEN);
        }
        assert_eq!(
            AppError::Auth(AuthError::MissingRefreshToken).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_credential_errors_are_mutually_exclusive() {
        let (_, mobile) = ErrorHandler::error_response(&AppError::Auth(AuthError::UnknownMobile), "a");
        let (_, password) =
            ErrorHandler::error_response(&AppError::Auth(AuthError::WrongPassword), "b");

        let mobile = mobile.errors.unwrap();
        let password = password.errors.unwrap();
        assert!(mobile.contains_key("mobile") && !mobile.contains_key("password"));
        assert!(password.contains_key("password") && !password.contains_key("mobile"));
    }

    #[test]
    fn test_bearer_failures_are_unauthorized() {
        assert_eq!(
            AppError::Auth(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::TokenInvalid).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
