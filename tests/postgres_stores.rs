//! PostgreSQL store tests. They need a reachable database configured through
//! `configuration.yaml` / `APP_DATABASE__*`; run with `cargo test -- --ignored`.

use auth_service::auth::{PgTokenLedger, TokenLedger};
use auth_service::configuration::{get_configuration, DatabaseSettings};
use auth_service::error::{AppError, DatabaseError};
use auth_service::users::{CredentialStore, NewUser, PgCredentialStore};
use secrecy::ExposeSecret;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

async fn configure_database() -> PgPool {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    create_database(&configuration.database).await
}

async fn create_database(config: &DatabaseSettings) -> PgPool {
    let mut connection =
        PgConnection::connect(config.connection_string_without_db().expose_secret())
            .await
            .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(config.connection_string().expose_secret())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

fn new_user(mobile: &str) -> NewUser {
    NewUser {
        name: "A".to_string(),
        mobile: mobile.to_string(),
        password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholderpla".to_string(),
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn duplicate_mobile_maps_to_duplicate_mobile_error() {
    let store = PgCredentialStore::new(configure_database().await);

    store.insert(new_user("5551234")).await.expect("First insert failed");
    let err = store.insert(new_user("5551234")).await.unwrap_err();

    assert!(matches!(err, AppError::Database(DatabaseError::DuplicateMobile)));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn ledger_round_trip_and_single_delete() {
    let pool = configure_database().await;
    let user = PgCredentialStore::new(pool.clone())
        .insert(new_user("5551234"))
        .await
        .expect("Failed to insert user");
    let ledger = PgTokenLedger::new(pool);

    ledger.insert("signed.refresh.token", user.id).await.unwrap();
    assert!(ledger.insert("signed.refresh.token", user.id).await.is_err());

    let record = ledger.find("signed.refresh.token").await.unwrap().unwrap();
    assert_eq!(record.user_id, user.id);
    assert_ne!(record.token_hash, "signed.refresh.token");

    assert!(ledger.delete_by_token("signed.refresh.token").await.unwrap());
    assert!(!ledger.delete_by_token("signed.refresh.token").await.unwrap());
    assert!(ledger.find("signed.refresh.token").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn purge_removes_only_old_records() {
    let pool = configure_database().await;
    let user = PgCredentialStore::new(pool.clone())
        .insert(new_user("5551234"))
        .await
        .expect("Failed to insert user");
    let ledger = PgTokenLedger::new(pool);
    ledger.insert("recent", user.id).await.unwrap();

    let purged = ledger
        .purge_created_before(chrono::Utc::now() - chrono::Duration::days(7))
        .await
        .unwrap();
    assert_eq!(purged, 0);

    let purged = ledger
        .purge_created_before(chrono::Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
}
