//! Tracking of the impacted enterprise set during an incremental run.
//!
//! Incremental document rebuilds are restricted to the enterprises actually
//! touched by the update bundle: the ones named directly, the owners of any
//! establishment or branch named, and the owners of every `entity_number`
//! appearing in an inserted or deleted fact row. Steps record into a temp
//! table as they go — crucially *before* deleting rows, while a child's
//! owner can still be resolved.

use kbo_core::{
  EnterpriseNumber,
  entity_number::{EntityClass, classify},
};
use rusqlite::{Connection, params};

use crate::Result;

/// Create (or clear) the per-run scratch table. The table is `TEMP`: it
/// lives on the pipeline's connection and vanishes with it.
pub fn reset(conn: &Connection) -> Result<()> {
  conn.execute_batch(
    "CREATE TEMP TABLE IF NOT EXISTS run_impacted (enterprise_number INTEGER PRIMARY KEY);
     DELETE FROM run_impacted;",
  )?;
  Ok(())
}

/// Record an enterprise by its raw stored key.
pub fn note_enterprise(conn: &Connection, number: i64) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO run_impacted (enterprise_number) VALUES (?1)",
    params![number],
  )?;
  Ok(())
}

/// Record the owner of a polymorphic `entity_number`: parsed directly for
/// the two-dot enterprise form, resolved through the `establishment` and
/// `branch` tables otherwise.
pub fn note_entity_number(conn: &Connection, entity_number: &str) -> Result<()> {
  match classify(entity_number) {
    EntityClass::Enterprise => {
      if let Ok(number) = EnterpriseNumber::parse(entity_number) {
        note_enterprise(conn, number.value() as i64)?;
      }
      Ok(())
    }
    EntityClass::Child => {
      conn.execute(
        "INSERT OR IGNORE INTO run_impacted (enterprise_number)
         SELECT enterprise_number FROM establishment WHERE establishment_number = ?1",
        params![entity_number],
      )?;
      conn.execute(
        "INSERT OR IGNORE INTO run_impacted (enterprise_number)
         SELECT enterprise_number FROM branch WHERE id = ?1",
        params![entity_number],
      )?;
      Ok(())
    }
  }
}

/// Record the owners of establishments about to be deleted or just inserted.
pub fn note_establishment_keys(conn: &Connection, keys: &[String]) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO run_impacted (enterprise_number)
     SELECT enterprise_number FROM establishment WHERE establishment_number = ?1",
  )?;
  for key in keys {
    stmt.execute(params![key])?;
  }
  Ok(())
}

/// Record the owners of branches about to be deleted or just inserted.
pub fn note_branch_keys(conn: &Connection, keys: &[String]) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO run_impacted (enterprise_number)
     SELECT enterprise_number FROM branch WHERE id = ?1",
  )?;
  for key in keys {
    stmt.execute(params![key])?;
  }
  Ok(())
}

/// The collected set, for the document rebuild step.
pub fn collected(conn: &Connection) -> Result<Vec<i64>> {
  let mut stmt =
    conn.prepare("SELECT enterprise_number FROM run_impacted ORDER BY enterprise_number")?;
  let rows = stmt
    .query_map([], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
