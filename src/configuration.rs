use config::ConfigError;
use secrecy::{ExposeSecret, Secret};

use crate::error::ConfigError as StartupConfigError;

/// Conventional variable holding the access-token signing secret
pub const ACCESS_SECRET_ENV: &str = "JWT_SECRET";
/// Conventional variable holding the refresh-token signing secret
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

/// Where users and refresh tokens are persisted
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    /// bcrypt work factor used when hashing new passwords
    pub password_hash_cost: u32,
    /// Seconds between ledger sweeps, 0 disables the sweeper
    pub ledger_sweep_interval: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> Secret<String> {
        Secret::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name
        ))
    }

    pub fn connection_string_without_db(&self) -> Secret<String> {
        Secret::new(format!(
            "postgres://{}:{}@{}:{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port
        ))
    }
}

/// JWT signing settings
///
/// Access and refresh tokens are signed with distinct secrets so that one
/// can never be accepted in place of the other.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default)]
    pub access_token_secret: Option<Secret<String>>,
    #[serde(default)]
    pub refresh_token_secret: Option<Secret<String>>,
    pub access_token_expiry: i64,  // seconds, 86400 = 1 day
    pub refresh_token_expiry: i64, // seconds, 604800 = 7 days
    pub issuer: String,
}

impl JwtSettings {
    /// Returns both secrets, refusing to start without them.
    pub fn secrets(&self) -> Result<(&str, &str), StartupConfigError> {
        let access = required_secret(&self.access_token_secret, ACCESS_SECRET_ENV)?;
        let refresh = required_secret(&self.refresh_token_secret, REFRESH_SECRET_ENV)?;

        if access == refresh {
            return Err(StartupConfigError::InvalidValue(
                "access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok((access, refresh))
    }

    pub fn validate(&self) -> Result<(), StartupConfigError> {
        self.secrets()?;

        if self.refresh_token_expiry <= 0 || self.access_token_expiry <= 0 {
            return Err(StartupConfigError::InvalidValue(
                "token expiry must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn required_secret<'a>(
    secret: &'a Option<Secret<String>>,
    name: &str,
) -> Result<&'a str, StartupConfigError> {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => {
            Ok(secret.expose_secret().as_str())
        }
        _ => Err(StartupConfigError::MissingRequired(name.to_string())),
    }
}

/// Load settings from `configuration.*`, then `APP_*` variables, then the
/// conventional signing-secret variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("application.storage", "postgres")?
        .set_default("application.password_hash_cost", i64::from(bcrypt::DEFAULT_COST))?
        .set_default("application.ledger_sweep_interval", 3600)?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.database_name", "auth_service")?
        .set_default("database.max_connections", 5)?
        .set_default("jwt.access_token_expiry", 86_400)?
        .set_default("jwt.refresh_token_expiry", 604_800)?
        .set_default("jwt.issuer", "auth-service")?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("jwt.access_token_secret", std::env::var(ACCESS_SECRET_ENV).ok())?
        .set_override_option("jwt.refresh_token_secret", std::env::var(REFRESH_SECRET_ENV).ok())?
        .build()?;
    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_settings(access: Option<&str>, refresh: Option<&str>) -> JwtSettings {
        JwtSettings {
            access_token_secret: access.map(|s| Secret::new(s.to_string())),
            refresh_token_secret: refresh.map(|s| Secret::new(s.to_string())),
            access_token_expiry: 86_400,
            refresh_token_expiry: 604_800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_missing_access_secret_is_rejected() {
        let err = jwt_settings(None, Some("refresh-secret")).validate().unwrap_err();
        assert!(matches!(err, StartupConfigError::MissingRequired(name) if name == ACCESS_SECRET_ENV));
    }

    #[test]
    fn test_blank_refresh_secret_is_rejected() {
        let err = jwt_settings(Some("access-secret"), Some("   ")).validate().unwrap_err();
        assert!(matches!(err, StartupConfigError::MissingRequired(name) if name == REFRESH_SECRET_ENV));
    }

    #[test]
    fn test_identical_secrets_are_rejected() {
        let result = jwt_settings(Some("same"), Some("same")).validate();
        assert!(matches!(result, Err(StartupConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_distinct_secrets_are_accepted() {
        assert!(jwt_settings(Some("access"), Some("refresh")).validate().is_ok());
    }

    #[test]
    fn test_connection_string() {
        let db = DatabaseSettings {
            username: "app".to_string(),
            password: Secret::new("pw".to_string()),
            port: 5432,
            host: "db".to_string(),
            database_name: "auth".to_string(),
            max_connections: 5,
        };
        assert_eq!(db.connection_string().expose_secret(), "postgres://app:pw@db:5432/auth");
        assert_eq!(db.connection_string_without_db().expose_secret(), "postgres://app:pw@db:5432");
    }
}
