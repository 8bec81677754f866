//! Test database setup and management
#![allow(dead_code)]

use campus_reviews::app_config::AppConfig;
use campus_reviews::{db, AppState};
use sea_orm::{DatabaseConnection, DbErr};

/// Signing key shared by every test app and fixture token.
pub const TEST_SECRET: &[u8] = b"integration-test-secret";

/// Fresh in-memory SQLite database with the full schema.
/// Each call gets its own database, so tests never see each other's rows.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = db::connect("sqlite::memory:", 1).await?;
    db::create_schema(&db).await?;
    Ok(db)
}

/// Application state over a fresh test database, with default config.
pub async fn setup_test_state() -> Result<AppState, DbErr> {
    let db = setup_test_database().await?;
    Ok(AppState::new(db, AppConfig::default(), TEST_SECRET))
}
