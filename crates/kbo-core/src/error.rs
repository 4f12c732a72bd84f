//! Error types for `kbo-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The string does not contain exactly ten digits, or the modulus-97
  /// checksum on the last two digits does not hold.
  #[error("invalid enterprise number: {0:?}")]
  InvalidIdentifier(String),

  #[error("unknown code category: {0:?}")]
  UnknownCategory(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
