/// Input validators for registration and login bodies
///
/// Every offending field is reported at once as a field → message map.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AuthError, FieldErrors, ValidationError};

const MAX_NAME_LENGTH: usize = 256;
// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    // Optional leading +, then 7 to 15 digits (E.164 upper bound)
    static ref MOBILE_REGEX: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
}

/// Registration input that passed validation
#[derive(Debug, PartialEq, Eq)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub mobile: &'a str,
    pub password: &'a str,
}

pub fn validate_registration<'a>(
    name: Option<&'a str>,
    mobile: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<Registration<'a>, ValidationError> {
    let mut errors = FieldErrors::new();

    let name = check(&mut errors, "name", is_valid_name(name));
    let mobile = check(&mut errors, "mobile", is_valid_mobile(mobile));
    let password = check(&mut errors, "password", is_valid_password(password));

    match (name, mobile, password) {
        (Some(name), Some(mobile), Some(password)) => Ok(Registration {
            name,
            mobile,
            password,
        }),
        _ => Err(ValidationError::Fields(errors)),
    }
}

/// Both login fields must be present and non-blank
pub fn require_login_fields<'a>(
    mobile: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), AuthError> {
    let mobile = mobile.map(str::trim).filter(|m| !m.is_empty());
    let password = password.filter(|p| !p.is_empty());

    match (mobile, password) {
        (Some(mobile), Some(password)) => Ok((mobile, password)),
        (mobile, password) => {
            let mut errors = FieldErrors::new();
            if mobile.is_none() {
                errors.insert("mobile".to_string(), "Mobile is required".to_string());
            }
            if password.is_none() {
                errors.insert("password".to_string(), "Password is required".to_string());
            }
            Err(AuthError::MissingCredentials(errors))
        }
    }
}

fn check<'a>(
    errors: &mut FieldErrors,
    field: &str,
    result: Result<&'a str, String>,
) -> Option<&'a str> {
    result
        .map_err(|message| {
            errors.insert(field.to_string(), message);
        })
        .ok()
}

/// Validates a display name: non-empty, bounded, no control characters
pub fn is_valid_name(name: Option<&str>) -> Result<&str, String> {
    let trimmed = name.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Name is too long (maximum {} characters)",
            MAX_NAME_LENGTH
        ));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err("Name contains invalid characters".to_string());
    }

    Ok(trimmed)
}

/// Validates a mobile number
pub fn is_valid_mobile(mobile: Option<&str>) -> Result<&str, String> {
    let trimmed = mobile.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err("Mobile is required".to_string());
    }

    if !MOBILE_REGEX.is_match(trimmed) {
        return Err("Mobile must be 7 to 15 digits, optionally prefixed with +".to_string());
    }

    Ok(trimmed)
}

pub fn is_valid_password(password: Option<&str>) -> Result<&str, String> {
    match password {
        None | Some("") => Err("Password is required".to_string()),
        Some(p) if p.len() > MAX_PASSWORD_BYTES => Err(format!(
            "Password is too long (maximum {} bytes)",
            MAX_PASSWORD_BYTES
        )),
        Some(p) => Ok(p),
    }
}
