//! The full-text index builder.
//!
//! `company_fts` is contentless: FTS5 stores only the inverted index, so
//! every rebuild recreates the virtual table and the sidecar map together,
//! in one transaction. The map is filled in `ORDER BY enterprise_number`,
//! which makes its AUTOINCREMENT row ids line up with insertion order; the
//! FTS rows then reuse those ids explicitly, so row id *i* in the index and
//! row *i* in the map always describe the same enterprise.

use rusqlite::{Connection, TransactionBehavior};
use tokio_util::sync::CancellationToken;

use crate::{Result, schema};

#[derive(Debug, Clone, Copy, Default)]
pub struct FtsOutcome {
  pub written:   u64,
  pub cancelled: bool,
}

/// Rebuild `company_fts` and `company_fts_map` from `company_document`.
pub fn rebuild_fts(
  conn: &mut Connection,
  cancel: &CancellationToken,
) -> Result<FtsOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut outcome = FtsOutcome::default();

  tx.execute_batch(
    "DROP TABLE IF EXISTS company_fts;
     DROP TABLE IF EXISTS company_fts_map;",
  )?;
  tx.execute_batch(schema::COMPANY_FTS_DDL)?;

  if cancel.is_cancelled() {
    outcome.cancelled = true;
    return Ok(outcome);
  }

  tx.execute(
    "INSERT INTO company_fts_map (enterprise_number)
     SELECT enterprise_number FROM company_document
     ORDER BY enterprise_number",
    [],
  )?;

  if cancel.is_cancelled() {
    outcome.cancelled = true;
    return Ok(outcome);
  }

  outcome.written = tx.execute(
    "INSERT INTO company_fts (
       rowid, company_name, commercial_name, street_nl, street_fr,
       city_nl, city_fr, postal_code,
       activity_desc_nl, activity_desc_fr, activity_desc_de, activity_desc_en
     )
     SELECT m.rowid,
            json_extract(d.payload, '$.fts.companyName'),
            json_extract(d.payload, '$.fts.commercialName'),
            json_extract(d.payload, '$.fts.street.nl'),
            json_extract(d.payload, '$.fts.street.fr'),
            json_extract(d.payload, '$.fts.city.nl'),
            json_extract(d.payload, '$.fts.city.fr'),
            json_extract(d.payload, '$.fts.postalCode'),
            json_extract(d.payload, '$.fts.activity.nl'),
            json_extract(d.payload, '$.fts.activity.fr'),
            json_extract(d.payload, '$.fts.activity.de'),
            json_extract(d.payload, '$.fts.activity.en')
     FROM company_document d
     JOIN company_fts_map m ON m.enterprise_number = d.enterprise_number
     ORDER BY d.enterprise_number",
    [],
  )? as u64;

  if cancel.is_cancelled() {
    outcome.cancelled = true;
    return Ok(outcome);
  }

  tx.commit()?;
  Ok(outcome)
}
