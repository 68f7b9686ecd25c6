use auth_service::auth::{spawn_ledger_sweeper, PasswordHasher};
use auth_service::configuration::{get_configuration, StorageBackend};
use auth_service::startup::{run, Stores};
use auth_service::telemetry::init_telemetry;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Refuse to start without both signing secrets
    if let Err(e) = configuration.jwt.validate() {
        tracing::error!("Invalid JWT configuration: {}", e);
        return Err(startup_error(
            std::io::ErrorKind::InvalidInput,
            "JWT configuration error",
        ));
    }

    let stores = match configuration.application.storage {
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(configuration.database.max_connections)
                .connect(configuration.database.connection_string().expose_secret())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    startup_error(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;
            tracing::info!("Database connection pool created successfully");
            Stores::postgres(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory stores; all data is lost on shutdown");
            Stores::in_memory()
        }
    };

    let sweep_interval = configuration.application.ledger_sweep_interval;
    if sweep_interval > 0 {
        spawn_ledger_sweeper(
            stores.ledger.clone(),
            chrono::Duration::seconds(configuration.jwt.refresh_token_expiry),
            std::time::Duration::from_secs(sweep_interval),
        );
        tracing::info!(every_secs = sweep_interval, "Ledger sweeper started");
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let hasher = PasswordHasher::new(configuration.application.password_hash_cost);
    let server = run(listener, stores, configuration.jwt.clone(), hasher)?;
    tracing::info!("Server started successfully");

    server.await
}
