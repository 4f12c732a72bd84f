//! [`SqliteStore`] — the single-file store behind both the import pipeline
//! and the read APIs.

use std::path::Path;

use kbo_core::EnterpriseNumber;
use kbo_core::company::Company;
use rusqlite::OptionalExtension as _;

use crate::{Result, StructuredCriteria, lookup, schema, search};

/// The seven tables loaded from the fact files, in import order.
pub const FACT_TABLES: [&str; 7] = [
  "enterprise",
  "establishment",
  "branch",
  "address",
  "denomination",
  "contact",
  "activity",
];

/// A KBO registry store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. The file is
/// single-writer: an import run holds the connection exclusively, readers
/// are expected to run against the steady state between runs.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, apply connection pragmas, and run
  /// schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // Connection pragmas; these hold for the connection's lifetime.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        // Negative cache_size is KiB: ~200 MB of page cache.
        conn.pragma_update(None, "cache_size", -200_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(schema::SCHEMA)?;
        conn.execute_batch(schema::COMPANY_DOCUMENT_DDL)?;
        conn.execute_batch(schema::COMPANY_LOCATION_DDL)?;
        conn.execute_batch(schema::COMPANY_FTS_DDL)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread with the raw [`rusqlite::Connection`].
  ///
  /// The import pipeline executes whole steps inside one call so a step's
  /// CSV loop, transaction, and cancellation checks stay on a single thread.
  pub async fn with_connection<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  // ── Bookkeeping reads ─────────────────────────────────────────────────────

  /// Row count of one of the known tables.
  pub async fn table_count(&self, table: &'static str) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
          r.get(0)
        })?)
      })
      .await?;
    Ok(count as u64)
  }

  /// `true` when every fact table is empty — the precondition for a full
  /// import.
  pub async fn is_empty(&self) -> Result<bool> {
    for table in FACT_TABLES {
      if self.table_count(table).await? > 0 {
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Read one `meta` variable.
  pub async fn get_meta(&self, variable: String) -> Result<Option<String>> {
    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM meta WHERE variable = ?1",
              rusqlite::params![variable],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }

  // ── Read planners ─────────────────────────────────────────────────────────

  /// Resolve one enterprise by number and project it for `language`.
  pub async fn get_company(
    &self,
    number: EnterpriseNumber,
    language: Option<String>,
  ) -> Result<Option<Company>> {
    self
      .with_connection(move |conn| {
        lookup::get_company(conn, number, language.as_deref())
      })
      .await
  }

  /// Ranked free-text search over names, addresses, and activities.
  pub async fn search_fulltext(
    &self,
    text: String,
    language: Option<String>,
    skip: i64,
    take: i64,
  ) -> Result<Vec<Company>> {
    self
      .with_connection(move |conn| {
        search::search_fulltext(conn, &text, language.as_deref(), skip, take)
      })
      .await
  }

  /// Structured `LIKE` search over names and locations.
  pub async fn search_structured(
    &self,
    criteria: StructuredCriteria,
    language: Option<String>,
    skip: i64,
    take: i64,
  ) -> Result<Vec<Company>> {
    self
      .with_connection(move |conn| {
        search::search_structured(conn, &criteria, language.as_deref(), skip, take)
      })
      .await
  }
}
