//! Error type for `kbo-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kbo_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A table that was about to be reset has no captured `CREATE` DDL in
  /// `sqlite_master` — the database predates the schema or is corrupt.
  #[error("no schema definition found for table {0:?}")]
  SchemaMismatch(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
