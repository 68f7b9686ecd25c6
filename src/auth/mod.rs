/// Authentication module
///
/// Credential verification, JWT issuance/validation, the refresh token
/// ledger and the rotation protocol built on top of them.

mod claims;
mod credentials;
mod jwt;
mod password;
pub mod refresh_token;
mod rotation;

pub use claims::Claims;
pub use credentials::{verify_credentials, Verification};
pub use jwt::{TokenIssuer, TokenRejection};
pub use password::{verify_password, PasswordHasher};
pub use refresh_token::{spawn_ledger_sweeper, PgTokenLedger, RefreshTokenRecord, TokenLedger};
pub use rotation::{issue_token_pair, revoke_refresh_token, rotate_refresh_token, TokenPair};
