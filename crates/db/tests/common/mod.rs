//! Shared setup for database integration tests.

use pixfeed_db::Migrator;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

/// A migrated, file-backed SQLite database that lives as long as the returned dir.
pub async fn test_db() -> (DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("pixfeed.db").display());

    let db = Database::connect(&url)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    (db, dir)
}
