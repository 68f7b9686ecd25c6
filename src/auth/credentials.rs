/// Credential Verifier
///
/// Checks a submitted mobile + password against the credential store.
/// Fails closed: store or hash errors never let a login through.

use crate::auth::password::verify_password;
use crate::users::{CredentialStore, User};

#[derive(Debug)]
pub enum Verification {
    Valid(User),
    NoSuchUser,
    WrongPassword,
}

pub async fn verify_credentials(
    store: &dyn CredentialStore,
    mobile: &str,
    password: &str,
) -> Verification {
    let user = match store.find_by_mobile(mobile).await {
        Ok(Some(user)) => user,
        Ok(None) => return Verification::NoSuchUser,
        Err(e) => {
            tracing::error!(error = %e, "Credential lookup failed");
            return Verification::NoSuchUser;
        }
    };

    match verify_password(password, &user.password_hash).await {
        Ok(true) => Verification::Valid(user),
        Ok(false) => Verification::WrongPassword,
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Stored password hash is unusable");
            Verification::WrongPassword
        }
    }
}
