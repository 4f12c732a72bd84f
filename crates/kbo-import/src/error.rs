//! Error type for `kbo-import`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A full (non-incremental) import was started against a store that
  /// already holds fact rows. Raised before any step runs.
  #[error("full import requires an empty database; run incrementally or start from a fresh file")]
  NotEmpty,

  #[error("core error: {0}")]
  Core(#[from] kbo_core::Error),

  #[error("csv error: {0}")]
  Csv(#[from] kbo_csv::Error),

  #[error("store error: {0}")]
  Store(#[from] kbo_store_sqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
