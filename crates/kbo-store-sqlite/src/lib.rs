//! SQLite backend for the KBO registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! connection thread without blocking the async runtime. The import pipeline
//! borrows the raw connection through [`SqliteStore::with_connection`] and
//! drives the synchronous helpers in [`bulk`], [`documents`], [`locations`]
//! and [`fts`]; the read planners live in [`lookup`] and [`search`].

pub mod bulk;
pub mod documents;
pub mod fts;
pub mod locations;
pub mod lookup;
pub mod schema;
pub mod search;
pub mod store;

pub mod error;

pub use error::{Error, Result};
pub use search::StructuredCriteria;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
