//! Error type for `kbo-csv`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("column {column:?} not found in {file}")]
  MissingColumn { file: PathBuf, column: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
