//! Synchronous bulk-write helpers, driven from inside
//! [`SqliteStore::with_connection`](crate::SqliteStore::with_connection)
//! closures by the import pipeline.
//!
//! One prepared statement per step, reused for every row, inside one
//! immediate transaction owned by the caller.

use chrono::NaiveDate;
use rusqlite::{Connection, Statement, params};

use crate::{Error, Result};

// ─── Table reset (full mode) ─────────────────────────────────────────────────

/// Drop and recreate `table` from its captured `CREATE` DDL, restoring its
/// indexes as well. Runs inside the caller's transaction so a cancelled or
/// failed step rolls the reset back together with its inserts.
pub fn reset_table(conn: &Connection, table: &str) -> Result<()> {
  let mut stmt = conn.prepare(
    "SELECT type, sql FROM sqlite_master
     WHERE tbl_name = ?1 AND sql IS NOT NULL
     ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END",
  )?;
  let ddl = stmt
    .query_map(params![table], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  drop(stmt);

  if !ddl.iter().any(|(kind, _)| kind == "table") {
    return Err(Error::SchemaMismatch(table.to_owned()));
  }

  conn.execute(&format!("DROP TABLE {table}"), [])?;
  for (_, sql) in &ddl {
    conn.execute(sql, [])?;
  }
  Ok(())
}

// ─── Delete by key (incremental mode) ────────────────────────────────────────

/// Delete every row whose `key_column` appears in `keys`, via a temp key
/// table and a single `DELETE … IN (SELECT …)`.
pub fn delete_by_text_key(
  conn: &Connection,
  table: &str,
  key_column: &str,
  keys: &[String],
) -> Result<usize> {
  if keys.is_empty() {
    return Ok(0);
  }
  conn.execute_batch(
    "CREATE TEMP TABLE IF NOT EXISTS bulk_delete_keys (key TEXT);
     DELETE FROM bulk_delete_keys;",
  )?;
  {
    let mut insert = conn.prepare("INSERT INTO bulk_delete_keys (key) VALUES (?1)")?;
    for key in keys {
      insert.execute(params![key])?;
    }
  }
  let deleted = conn.execute(
    &format!(
      "DELETE FROM {table} WHERE {key_column} IN (SELECT key FROM bulk_delete_keys)"
    ),
    [],
  )?;
  conn.execute("DELETE FROM bulk_delete_keys", [])?;
  Ok(deleted)
}

/// Integer-keyed variant, for `enterprise.enterprise_number`.
pub fn delete_by_integer_key(
  conn: &Connection,
  table: &str,
  key_column: &str,
  keys: &[i64],
) -> Result<usize> {
  if keys.is_empty() {
    return Ok(0);
  }
  conn.execute_batch(
    "CREATE TEMP TABLE IF NOT EXISTS bulk_delete_ids (key INTEGER);
     DELETE FROM bulk_delete_ids;",
  )?;
  {
    let mut insert = conn.prepare("INSERT INTO bulk_delete_ids (key) VALUES (?1)")?;
    for key in keys {
      insert.execute(params![key])?;
    }
  }
  let deleted = conn.execute(
    &format!(
      "DELETE FROM {table} WHERE {key_column} IN (SELECT key FROM bulk_delete_ids)"
    ),
    [],
  )?;
  conn.execute("DELETE FROM bulk_delete_ids", [])?;
  Ok(deleted)
}

// ─── Typed rows ──────────────────────────────────────────────────────────────

/// A mapped row ready for insertion. Implementations pair a target table
/// with its insert statement; the generic CSV import step is written once
/// against this trait.
pub trait TableRow: Send + 'static {
  /// Target table name.
  const TABLE: &'static str;
  /// Column the `<table>_delete.csv` file keys on.
  const DELETE_KEY: &'static str;
  /// Positional insert statement for [`Self::insert`].
  const INSERT_SQL: &'static str;

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()>;
}

#[derive(Debug, Clone)]
pub struct EnterpriseRow {
  pub enterprise_number:      i64,
  pub juridical_situation_id: i64,
  pub type_of_enterprise_id:  i64,
  pub juridical_form_id:      Option<i64>,
  pub juridical_form_cac_id:  Option<i64>,
  pub start_date:             Option<NaiveDate>,
}

impl TableRow for EnterpriseRow {
  const TABLE: &'static str = "enterprise";
  const DELETE_KEY: &'static str = "enterprise_number";
  const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO enterprise (
     enterprise_number, juridical_situation_id, type_of_enterprise_id,
     juridical_form_id, juridical_form_cac_id, start_date
   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.enterprise_number,
      self.juridical_situation_id,
      self.type_of_enterprise_id,
      self.juridical_form_id,
      self.juridical_form_cac_id,
      self.start_date,
    ])?;
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct EstablishmentRow {
  pub establishment_number: String,
  pub start_date:           Option<NaiveDate>,
  pub enterprise_number:    i64,
}

impl TableRow for EstablishmentRow {
  const TABLE: &'static str = "establishment";
  const DELETE_KEY: &'static str = "establishment_number";
  const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO establishment (
     establishment_number, start_date, enterprise_number
   ) VALUES (?1, ?2, ?3)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.establishment_number,
      self.start_date,
      self.enterprise_number,
    ])?;
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct BranchRow {
  pub id:                String,
  pub start_date:        Option<NaiveDate>,
  pub enterprise_number: i64,
}

impl TableRow for BranchRow {
  const TABLE: &'static str = "branch";
  const DELETE_KEY: &'static str = "id";
  const INSERT_SQL: &'static str =
    "INSERT OR REPLACE INTO branch (id, start_date, enterprise_number)
     VALUES (?1, ?2, ?3)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![self.id, self.start_date, self.enterprise_number])?;
    Ok(())
  }
}

#[derive(Debug, Clone, Default)]
pub struct AddressRow {
  pub entity_number:      String,
  pub type_of_address_id: i64,
  pub country_nl:         String,
  pub country_fr:         String,
  pub zipcode:            String,
  pub municipality_nl:    String,
  pub municipality_fr:    String,
  pub street_nl:          String,
  pub street_fr:          String,
  pub house_number:       String,
  pub box_number:         String,
  pub extra_info:         String,
  pub date_striking_off:  Option<NaiveDate>,
}

impl TableRow for AddressRow {
  const TABLE: &'static str = "address";
  const DELETE_KEY: &'static str = "entity_number";
  const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO address (
     entity_number, type_of_address_id, country_nl, country_fr, zipcode,
     municipality_nl, municipality_fr, street_nl, street_fr,
     house_number, box_number, extra_info, date_striking_off
   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.entity_number,
      self.type_of_address_id,
      self.country_nl,
      self.country_fr,
      self.zipcode,
      self.municipality_nl,
      self.municipality_fr,
      self.street_nl,
      self.street_fr,
      self.house_number,
      self.box_number,
      self.extra_info,
      self.date_striking_off,
    ])?;
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct DenominationRow {
  pub entity_number:           String,
  pub language_id:             i64,
  pub type_of_denomination_id: i64,
  pub value:                   String,
}

impl TableRow for DenominationRow {
  const TABLE: &'static str = "denomination";
  const DELETE_KEY: &'static str = "entity_number";
  const INSERT_SQL: &'static str = "INSERT INTO denomination (
     entity_number, language_id, type_of_denomination_id, value
   ) VALUES (?1, ?2, ?3, ?4)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.entity_number,
      self.language_id,
      self.type_of_denomination_id,
      self.value,
    ])?;
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct ContactRow {
  pub entity_number:     String,
  pub entity_contact_id: i64,
  pub contact_type_id:   i64,
  pub value:             String,
}

impl TableRow for ContactRow {
  const TABLE: &'static str = "contact";
  const DELETE_KEY: &'static str = "entity_number";
  const INSERT_SQL: &'static str = "INSERT INTO contact (
     entity_number, entity_contact_id, contact_type_id, value
   ) VALUES (?1, ?2, ?3, ?4)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.entity_number,
      self.entity_contact_id,
      self.contact_type_id,
      self.value,
    ])?;
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct ActivityRow {
  pub entity_number:     String,
  pub activity_group_id: i64,
  pub classification_id: i64,
  pub nace_code_id:      i64,
}

impl TableRow for ActivityRow {
  const TABLE: &'static str = "activity";
  const DELETE_KEY: &'static str = "entity_number";
  const INSERT_SQL: &'static str = "INSERT INTO activity (
     entity_number, activity_group_id, classification_id, nace_code_id
   ) VALUES (?1, ?2, ?3, ?4)";

  fn insert(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
    stmt.execute(params![
      self.entity_number,
      self.activity_group_id,
      self.classification_id,
      self.nace_code_id,
    ])?;
    Ok(())
  }
}
