//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use migration::{Migrator, MigratorTrait};
  use sea_orm::{ConnectOptions, Database, DatabaseConnection};
  use tempfile::TempDir;

  /// Creates an in-memory SQLite database with the production schema
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }

  /// File-backed database on a single connection, as in production.
  /// Needed wherever `VACUUM INTO` snapshots are taken; keep the directory
  /// alive for as long as the connection.
  pub async fn setup_file() -> (TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("ledger.db").display());

    let mut opts = ConnectOptions::new(url);
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (dir, db)
  }
}
