//! The company-location builder — a flat per-entity address projection.
//!
//! Every addressed entity (enterprise, establishment, branch) becomes one
//! row carrying its owning enterprise, resolved through the `entity_owner`
//! view (the SQL counterpart of the two-dots classifier). The structured
//! search uses this table for its city/street/postal-code predicates.

use rusqlite::{Connection, TransactionBehavior};
use tokio_util::sync::CancellationToken;

use crate::{Result, schema};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationsOutcome {
  pub written:   u64,
  pub cancelled: bool,
}

/// Drop and refill `company_location` in one transaction.
pub fn rebuild_locations(
  conn: &mut Connection,
  cancel: &CancellationToken,
) -> Result<LocationsOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut outcome = LocationsOutcome::default();

  tx.execute_batch("DROP TABLE IF EXISTS company_location")?;
  tx.execute_batch(schema::COMPANY_LOCATION_DDL)?;

  if cancel.is_cancelled() {
    outcome.cancelled = true;
    return Ok(outcome);
  }

  outcome.written = tx.execute(
    "INSERT INTO company_location (
       enterprise_number, entity_number, zipcode,
       municipality_nl, municipality_fr, street_nl, street_fr, house_number
     )
     SELECT o.enterprise_number, a.entity_number, a.zipcode,
            a.municipality_nl, a.municipality_fr, a.street_nl, a.street_fr,
            a.house_number
     FROM address a
     JOIN entity_owner o ON o.entity_number = a.entity_number",
    [],
  )? as u64;

  if cancel.is_cancelled() {
    outcome.cancelled = true;
    return Ok(outcome);
  }

  tx.commit()?;
  Ok(outcome)
}
