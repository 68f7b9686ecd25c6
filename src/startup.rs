use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, middleware::Logger, web, App, HttpRequest, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{PasswordHasher, PgTokenLedger, TokenIssuer, TokenLedger};
use crate::configuration::JwtSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::memory::{InMemoryCredentialStore, InMemoryTokenLedger};
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};
use crate::users::{CredentialStore, PgCredentialStore};

/// The two external collaborators the service depends on
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub ledger: Arc<dyn TokenLedger>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            credentials: Arc::new(PgCredentialStore::new(pool.clone())),
            ledger: Arc::new(PgTokenLedger::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(InMemoryCredentialStore::default()),
            ledger: Arc::new(InMemoryTokenLedger::default()),
        }
    }
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::MalformedBody(err.to_string())).into()
}

pub fn run(
    listener: TcpListener,
    stores: Stores,
    jwt_config: JwtSettings,
    hasher: PasswordHasher,
) -> Result<Server, std::io::Error> {
    let issuer = TokenIssuer::new(&jwt_config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let credentials = web::Data::from(stores.credentials);
    let ledger = web::Data::from(stores.ledger);
    let issuer_data = web::Data::new(issuer.clone());
    let hasher = web::Data::new(hasher);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(credentials.clone())
            .app_data(ledger.clone())
            .app_data(issuer_data.clone())
            .app_data(hasher.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))

            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
