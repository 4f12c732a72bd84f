//! The pipeline's steps: one per source file, plus the three derivation
//! steps. CSV steps run their whole body — delete keys, reset, mapped
//! inserts — inside one immediate transaction on the connection thread, with
//! cancellation checked at every record boundary.
//!
//! Row counters come from the connection's update hook, so the reported
//! inserted/deleted numbers reflect what the database actually did (an
//! `INSERT OR REPLACE` counts both ways), not what the mapper emitted.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use kbo_core::EnterpriseNumber;
use kbo_csv::records::{
  ActivityRecord, AddressRecord, BranchRecord, CodeRecord, ContactRecord,
  DenominationRecord, EnterpriseRecord, EstablishmentRecord, MetaRecord,
};
use kbo_store_sqlite::{
  SqliteStore,
  bulk::{
    self, ActivityRow, AddressRow, BranchRow, ContactRow, DenominationRow,
    EnterpriseRow, EstablishmentRow, TableRow,
  },
  documents::{self, DocumentScope},
  fts, locations,
};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, hooks::Action,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{
  Result, impacted,
  mapper::{MapResult, Mapper},
  pipeline::{RunContext, RunState, StepOutcome},
  progress::TaskProgress,
};

// ─── Step set ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStep {
  Meta,
  Codes,
  Enterprises,
  Establishments,
  Branches,
  Addresses,
  Denominations,
  Contacts,
  Activities,
  RebuildDocuments,
  RebuildLocations,
  RebuildFts,
}

impl ImportStep {
  /// The fixed full-import order.
  pub const FULL_ORDER: [ImportStep; 12] = [
    Self::Meta,
    Self::Codes,
    Self::Enterprises,
    Self::Establishments,
    Self::Branches,
    Self::Addresses,
    Self::Denominations,
    Self::Contacts,
    Self::Activities,
    Self::RebuildDocuments,
    Self::RebuildLocations,
    Self::RebuildFts,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Self::Meta => "ImportMeta",
      Self::Codes => "ImportCodes",
      Self::Enterprises => "ImportEnterprises",
      Self::Establishments => "ImportEstablishments",
      Self::Branches => "ImportBranches",
      Self::Addresses => "ImportAddresses",
      Self::Denominations => "ImportDenominations",
      Self::Contacts => "ImportContacts",
      Self::Activities => "ImportActivities",
      Self::RebuildDocuments => "RebuildCompanyDocuments",
      Self::RebuildLocations => "RebuildCompanyLocations",
      Self::RebuildFts => "RebuildFtsIndex",
    }
  }

  /// File stem for CSV-backed steps.
  pub fn source_stem(self) -> Option<&'static str> {
    match self {
      Self::Meta => Some("meta"),
      Self::Codes => Some("code"),
      Self::Enterprises => Some("enterprise"),
      Self::Establishments => Some("establishment"),
      Self::Branches => Some("branch"),
      Self::Addresses => Some("address"),
      Self::Denominations => Some("denomination"),
      Self::Contacts => Some("contact"),
      Self::Activities => Some("activity"),
      Self::RebuildDocuments | Self::RebuildLocations | Self::RebuildFts => None,
    }
  }

  /// `meta.csv` and `code.csv` are always full drops; everything else gets
  /// an `_insert`/`_delete` pair in incremental bundles.
  pub fn has_incremental_pair(self) -> bool {
    !matches!(self, Self::Meta | Self::Codes) && self.source_stem().is_some()
  }

  /// Row estimate for planning. CSV steps estimate their source file (the
  /// `_insert` file in incremental mode); the document rebuild uses the
  /// run's baseline.
  pub fn estimate(self, ctx: &RunContext, baseline: u64) -> Result<Option<u64>> {
    match self.source_stem() {
      Some(stem) => {
        let file = if ctx.incremental && self.has_incremental_pair() {
          format!("{stem}_insert.csv")
        } else {
          format!("{stem}.csv")
        };
        Ok(kbo_csv::estimate_row_count(&ctx.folder.join(file))?)
      }
      None => match self {
        Self::RebuildDocuments => Ok(Some(baseline)),
        _ => Ok(None),
      },
    }
  }

  pub async fn execute(
    self,
    store: &SqliteStore,
    ctx: &RunContext,
    state: &mut RunState,
    cancel: &CancellationToken,
    progress: TaskProgress,
  ) -> Result<StepOutcome> {
    match self {
      Self::Meta => import_meta(store, ctx, cancel, progress).await,
      Self::Codes => import_codes(store, ctx, cancel, progress).await,
      Self::Enterprises => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          EnterpriseRecord,
          EnterpriseRow,
        > {
          stem:          "enterprise",
          delete_header: "EnterpriseNumber",
          integer_key:   true,
          map:           |m, r| Mapper::enterprise(m, r),
          note_deletes:  |conn, keys| {
            for key in keys {
              if let Ok(n) = EnterpriseNumber::parse(key) {
                impacted::note_enterprise(conn, n.value() as i64)?;
              }
            }
            Ok(())
          },
          note_insert: |conn, row| impacted::note_enterprise(conn, row.enterprise_number),
        })
        .await
      }
      Self::Establishments => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          EstablishmentRecord,
          EstablishmentRow,
        > {
          stem:          "establishment",
          delete_header: "EstablishmentNumber",
          integer_key:   false,
          map:           |m, r| Mapper::establishment(m, r),
          note_deletes:  impacted::note_establishment_keys,
          note_insert:   |conn, row| impacted::note_enterprise(conn, row.enterprise_number),
        })
        .await
      }
      Self::Branches => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          BranchRecord,
          BranchRow,
        > {
          stem:          "branch",
          delete_header: "Id",
          integer_key:   false,
          map:           |m, r| Mapper::branch(m, r),
          note_deletes:  impacted::note_branch_keys,
          note_insert:   |conn, row| impacted::note_enterprise(conn, row.enterprise_number),
        })
        .await
      }
      Self::Addresses => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          AddressRecord,
          AddressRow,
        > {
          stem:          "address",
          delete_header: "EntityNumber",
          integer_key:   false,
          map:           |m, r| Mapper::address(m, r),
          note_deletes:  note_entity_keys,
          note_insert:   |conn, row| impacted::note_entity_number(conn, &row.entity_number),
        })
        .await
      }
      Self::Denominations => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          DenominationRecord,
          DenominationRow,
        > {
          stem:          "denomination",
          delete_header: "EntityNumber",
          integer_key:   false,
          map:           |m, r| Mapper::denomination(m, r),
          note_deletes:  note_entity_keys,
          note_insert:   |conn, row| impacted::note_entity_number(conn, &row.entity_number),
        })
        .await
      }
      Self::Contacts => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          ContactRecord,
          ContactRow,
        > {
          stem:          "contact",
          delete_header: "EntityNumber",
          integer_key:   false,
          map:           |m, r| Mapper::contact(m, r),
          note_deletes:  note_entity_keys,
          note_insert:   |conn, row| impacted::note_entity_number(conn, &row.entity_number),
        })
        .await
      }
      Self::Activities => {
        let cache = state.code_cache(store).await?;
        import_fact(store, ctx, cache, cancel, progress, FactWiring::<
          ActivityRecord,
          ActivityRow,
        > {
          stem:          "activity",
          delete_header: "EntityNumber",
          integer_key:   false,
          map:           |m, r| Mapper::activity(m, r),
          note_deletes:  note_entity_keys,
          note_insert:   |conn, row| impacted::note_entity_number(conn, &row.entity_number),
        })
        .await
      }
      Self::RebuildDocuments => rebuild_documents(store, ctx, cancel, progress).await,
      Self::RebuildLocations => rebuild_locations(store, cancel).await,
      Self::RebuildFts => rebuild_fts_index(store, cancel).await,
    }
  }
}

fn note_entity_keys(conn: &Connection, keys: &[String]) -> Result<()> {
  for key in keys {
    impacted::note_entity_number(conn, key)?;
  }
  Ok(())
}

// ─── Update-hook counters ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Counters {
  inserted: Arc<AtomicU64>,
  updated:  Arc<AtomicU64>,
  deleted:  Arc<AtomicU64>,
}

impl Counters {
  fn install(&self, conn: &Connection, tables: &'static [&'static str]) {
    let counters = self.clone();
    conn.update_hook(Some(
      move |action: Action, _db: &str, table: &str, _rowid: i64| {
        if !tables.contains(&table) {
          return;
        }
        let counter = match action {
          Action::SQLITE_INSERT => &counters.inserted,
          Action::SQLITE_UPDATE => &counters.updated,
          Action::SQLITE_DELETE => &counters.deleted,
          _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
      },
    ));
  }

  fn clear(conn: &Connection) {
    conn.update_hook(None::<fn(Action, &str, &str, i64)>);
  }

  fn inserted(&self) -> u64 { self.inserted.load(Ordering::Relaxed) }

  fn updated(&self) -> u64 { self.updated.load(Ordering::Relaxed) }

  fn deleted(&self) -> u64 { self.deleted.load(Ordering::Relaxed) }
}

// ─── Generic fact import ─────────────────────────────────────────────────────

/// Per-entity wiring for the shared CSV import body.
struct FactWiring<Rec, Row> {
  stem:          &'static str,
  /// Key column header of the `_delete.csv` file.
  delete_header: &'static str,
  /// Enterprise keys bind as integers, everything else as text.
  integer_key:   bool,
  map:           fn(&Mapper<'_>, &Rec) -> MapResult<Row>,
  /// Incremental bookkeeping, run while the doomed rows still exist.
  note_deletes:  fn(&Connection, &[String]) -> Result<()>,
  /// Incremental bookkeeping per inserted row.
  note_insert:   fn(&Connection, &Row) -> Result<()>,
}

async fn import_fact<Rec, Row>(
  store: &SqliteStore,
  ctx: &RunContext,
  cache: Arc<crate::cache::CodeCache>,
  cancel: &CancellationToken,
  progress: TaskProgress,
  wiring: FactWiring<Rec, Row>,
) -> Result<StepOutcome>
where
  Rec: DeserializeOwned + 'static,
  Row: TableRow,
{
  let folder = ctx.folder.clone();
  let incremental = ctx.incremental;
  let limit = ctx.limit;
  let cancel = cancel.clone();

  store
    .with_connection(move |conn| {
      Ok(import_fact_sync(
        conn, &folder, incremental, limit, &cache, &cancel, progress, wiring,
      ))
    })
    .await?
}

#[allow(clippy::too_many_arguments)]
fn import_fact_sync<Rec, Row>(
  conn: &mut Connection,
  folder: &std::path::Path,
  incremental: bool,
  limit: Option<u64>,
  cache: &crate::cache::CodeCache,
  cancel: &CancellationToken,
  mut progress: TaskProgress,
  wiring: FactWiring<Rec, Row>,
) -> Result<StepOutcome>
where
  Rec: DeserializeOwned + 'static,
  Row: TableRow,
{
  let stem = wiring.stem;
  let insert_path = if incremental {
    folder.join(format!("{stem}_insert.csv"))
  } else {
    folder.join(format!("{stem}.csv"))
  };
  let delete_path = folder.join(format!("{stem}_delete.csv"));

  let have_inserts = insert_path.exists();
  let have_deletes = incremental && delete_path.exists();
  if !have_inserts && !have_deletes {
    tracing::warn!(file = %insert_path.display(), "source file missing, step skipped");
    return Ok(StepOutcome::missing_file());
  }

  let counters = Counters::default();
  counters.install(conn, &[Row::TABLE]);
  let result = (|| {
    let mut outcome = StepOutcome::default();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if incremental {
      if have_deletes {
        let keys = kbo_csv::read_keys(&delete_path, wiring.delete_header)?;
        (wiring.note_deletes)(&tx, &keys)?;
        if wiring.integer_key {
          let mut parsed = Vec::with_capacity(keys.len());
          for key in &keys {
            match EnterpriseNumber::parse(key) {
              Ok(n) => parsed.push(n.value() as i64),
              Err(_) => outcome.errors += 1,
            }
          }
          bulk::delete_by_integer_key(&tx, Row::TABLE, Row::DELETE_KEY, &parsed)?;
        } else {
          bulk::delete_by_text_key(&tx, Row::TABLE, Row::DELETE_KEY, &keys)?;
        }
      }
    } else {
      bulk::reset_table(&tx, Row::TABLE)?;
    }

    if cancel.is_cancelled() {
      outcome.cancelled = true;
      return Ok(outcome);
    }

    let mapper = Mapper::new(cache);
    let mut stmt = tx.prepare(Row::INSERT_SQL)?;
    let mut processed = 0u64;

    for record in kbo_csv::read_records::<Rec>(&insert_path)? {
      if cancel.is_cancelled() {
        outcome.cancelled = true;
        return Ok(outcome);
      }
      if limit.is_some_and(|l| processed >= l) {
        break;
      }
      processed += 1;

      match record {
        Err(e) => {
          outcome.errors += 1;
          tracing::debug!(row = processed, error = %e, "unreadable record");
        }
        Ok(record) => match (wiring.map)(&mapper, &record) {
          Err(reasons) => {
            outcome.errors += 1;
            tracing::debug!(row = processed, ?reasons, "row rejected");
          }
          Ok(row) => {
            row.insert(&mut stmt)?;
            if incremental {
              (wiring.note_insert)(&tx, &row)?;
            }
          }
        },
      }
      progress.update(processed);
    }

    drop(stmt);
    tx.commit()?;
    outcome.imported = counters.inserted();
    outcome.deleted = counters.deleted();
    Ok(outcome)
  })();
  Counters::clear(conn);
  result
}

// ─── Meta ────────────────────────────────────────────────────────────────────

async fn import_meta(
  store: &SqliteStore,
  ctx: &RunContext,
  cancel: &CancellationToken,
  mut progress: TaskProgress,
) -> Result<StepOutcome> {
  let path = ctx.folder.join("meta.csv");
  if !path.exists() {
    tracing::warn!(file = %path.display(), "source file missing, step skipped");
    return Ok(StepOutcome::missing_file());
  }
  let cancel = cancel.clone();

  store
    .with_connection(move |conn| {
      Ok((|| {
        let counters = Counters::default();
        counters.install(conn, &["meta"]);
        let result = (|| {
          let mut outcome = StepOutcome::default();
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          tx.execute("DELETE FROM meta", [])?;

          let mut stmt =
            tx.prepare("INSERT OR REPLACE INTO meta (variable, value) VALUES (?1, ?2)")?;
          let mut processed = 0u64;
          for record in kbo_csv::read_records::<MetaRecord>(&path)? {
            if cancel.is_cancelled() {
              outcome.cancelled = true;
              return Ok(outcome);
            }
            processed += 1;
            match record {
              Err(e) => {
                outcome.errors += 1;
                tracing::debug!(row = processed, error = %e, "unreadable record");
              }
              Ok(record) => {
                stmt.execute(rusqlite::params![record.variable, record.value])?;
              }
            }
            progress.update(processed);
          }

          drop(stmt);
          tx.commit()?;
          outcome.imported = counters.inserted();
          outcome.deleted = counters.deleted();
          Ok(outcome)
        })();
        Counters::clear(conn);
        result
      })())
    })
    .await?
}

// ─── Codes ───────────────────────────────────────────────────────────────────

/// Two-phase staged load: parse into temp tables, then reconcile the live
/// `code`/`code_description` tables — insert-or-ignore new codes, add and
/// update descriptions, and delete whatever disappeared from the source.
/// Existing code ids survive, so fact rows keep their references.
async fn import_codes(
  store: &SqliteStore,
  ctx: &RunContext,
  cancel: &CancellationToken,
  mut progress: TaskProgress,
) -> Result<StepOutcome> {
  let path = ctx.folder.join("code.csv");
  if !path.exists() {
    tracing::warn!(file = %path.display(), "source file missing, step skipped");
    return Ok(StepOutcome::missing_file());
  }
  let cancel = cancel.clone();

  store
    .with_connection(move |conn| {
      Ok((|| {
        let counters = Counters::default();
        counters.install(conn, &["code", "code_description"]);
        let result = (|| {
          let mut outcome = StepOutcome::default();
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

          tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS codes_stage (category TEXT, code TEXT);
             CREATE TEMP TABLE IF NOT EXISTS code_description_stage
               (category TEXT, code TEXT, language TEXT, description TEXT);
             DELETE FROM codes_stage;
             DELETE FROM code_description_stage;",
          )?;

          {
            let mut stage_code =
              tx.prepare("INSERT INTO codes_stage (category, code) VALUES (?1, ?2)")?;
            let mut stage_description = tx.prepare(
              "INSERT INTO code_description_stage (category, code, language, description)
               VALUES (?1, ?2, ?3, ?4)",
            )?;

            let mut processed = 0u64;
            for record in kbo_csv::read_records::<CodeRecord>(&path)? {
              if cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(outcome);
              }
              processed += 1;
              match record {
                Err(e) => {
                  outcome.errors += 1;
                  tracing::debug!(row = processed, error = %e, "unreadable record");
                }
                Ok(record) => {
                  stage_code
                    .execute(rusqlite::params![record.category, record.code])?;
                  if !record.language.is_empty() {
                    stage_description.execute(rusqlite::params![
                      record.category,
                      record.code,
                      record.language,
                      record.description,
                    ])?;
                  }
                }
              }
              progress.update(processed);
            }
          }

          if cancel.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
          }

          tx.execute(
            "INSERT OR IGNORE INTO code (category, code_value)
             SELECT DISTINCT category, code FROM codes_stage",
            [],
          )?;
          tx.execute(
            "INSERT INTO code_description (code_id, language, description)
             SELECT c.id, s.language, s.description
             FROM code_description_stage s
             JOIN code c ON c.category = s.category AND c.code_value = s.code
             WHERE NOT EXISTS (
               SELECT 1 FROM code_description d
               WHERE d.code_id = c.id AND d.language = s.language
             )",
            [],
          )?;

          if cancel.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
          }

          tx.execute(
            "UPDATE code_description SET description = (
               SELECT s.description FROM code_description_stage s
               JOIN code c ON c.category = s.category AND c.code_value = s.code
               WHERE c.id = code_description.code_id
                 AND s.language = code_description.language
             )
             WHERE EXISTS (
               SELECT 1 FROM code_description_stage s
               JOIN code c ON c.category = s.category AND c.code_value = s.code
               WHERE c.id = code_description.code_id
                 AND s.language = code_description.language
                 AND s.description <> code_description.description
             )",
            [],
          )?;
          tx.execute(
            "DELETE FROM code_description WHERE NOT EXISTS (
               SELECT 1 FROM code_description_stage s
               JOIN code c ON c.category = s.category AND c.code_value = s.code
               WHERE c.id = code_description.code_id
                 AND s.language = code_description.language
             )",
            [],
          )?;
          tx.execute(
            "DELETE FROM code WHERE NOT EXISTS (
               SELECT 1 FROM codes_stage s
               WHERE s.category = code.category AND s.code = code.code_value
             )",
            [],
          )?;

          tx.commit()?;
          outcome.imported = counters.inserted() + counters.updated();
          outcome.deleted = counters.deleted();
          Ok(outcome)
        })();
        Counters::clear(conn);
        result
      })())
    })
    .await?
}

// ─── Derivation steps ────────────────────────────────────────────────────────

async fn rebuild_documents(
  store: &SqliteStore,
  ctx: &RunContext,
  cancel: &CancellationToken,
  mut progress: TaskProgress,
) -> Result<StepOutcome> {
  let incremental = ctx.incremental;
  let cancel = cancel.clone();

  store
    .with_connection(move |conn| {
      Ok((|| {
        let scope = if incremental {
          DocumentScope::Subset(impacted::collected(conn)?)
        } else {
          DocumentScope::All
        };
        // The snapshot's extract number stamps the documents it produced.
        let import_id: Option<String> = conn
          .query_row(
            "SELECT value FROM meta WHERE variable = 'ExtractNumber'",
            [],
            |r| r.get(0),
          )
          .optional()?;

        let out = documents::rebuild_documents(
          conn,
          &scope,
          import_id.as_deref(),
          &cancel,
          &mut |written| progress.update(written),
        )?;
        Ok(StepOutcome {
          imported:  out.written,
          deleted:   out.removed,
          errors:    0,
          cancelled: out.cancelled,
        })
      })())
    })
    .await?
}

async fn rebuild_locations(
  store: &SqliteStore,
  cancel: &CancellationToken,
) -> Result<StepOutcome> {
  let cancel = cancel.clone();
  store
    .with_connection(move |conn| {
      Ok((|| {
        let out = locations::rebuild_locations(conn, &cancel)?;
        Ok(StepOutcome {
          imported:  out.written,
          deleted:   0,
          errors:    0,
          cancelled: out.cancelled,
        })
      })())
    })
    .await?
}

async fn rebuild_fts_index(
  store: &SqliteStore,
  cancel: &CancellationToken,
) -> Result<StepOutcome> {
  let cancel = cancel.clone();
  store
    .with_connection(move |conn| {
      Ok((|| {
        let out = fts::rebuild_fts(conn, &cancel)?;
        Ok(StepOutcome {
          imported:  out.written,
          deleted:   0,
          errors:    0,
          cancelled: out.cancelled,
        })
      })())
    })
    .await?
}
