//! The import orchestrator — wires step lists for the three entry points
//! and enforces the full-import precondition.

use std::path::{Path, PathBuf};

use kbo_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Result,
  pipeline::{Pipeline, RunContext, RunSummary},
  progress::Reporter,
  steps::ImportStep,
};

/// Default baseline estimate for a full monthly drop.
const FULL_BASELINE: u64 = 2_000_000;
/// Default baseline estimate for an incremental drop.
const INCREMENTAL_BASELINE: u64 = 100_000;

pub struct Importer {
  store:    SqliteStore,
  reporter: Reporter,
}

impl Importer {
  pub fn new(store: SqliteStore, reporter: Reporter) -> Self {
    Self { store, reporter }
  }

  /// Import the whole bundle in `folder`.
  ///
  /// In full mode every fact table must be empty; otherwise the run fails
  /// with [`Error::NotEmpty`] before any step executes.
  pub async fn full_import(
    &self,
    folder: impl Into<PathBuf>,
    incremental: bool,
    limit: Option<u64>,
    cancel: &CancellationToken,
  ) -> Result<RunSummary> {
    self
      .run(
        ImportStep::FULL_ORDER.to_vec(),
        folder.into(),
        incremental,
        limit,
        cancel,
      )
      .await
  }

  /// Import a subset of the source tables. The derivation steps always run
  /// so the projections stay consistent with whatever was loaded.
  pub async fn import_files(
    &self,
    folder: impl Into<PathBuf>,
    files: &[ImportStep],
    incremental: bool,
    limit: Option<u64>,
    cancel: &CancellationToken,
  ) -> Result<RunSummary> {
    let steps: Vec<ImportStep> = ImportStep::FULL_ORDER
      .into_iter()
      .filter(|step| {
        step.source_stem().is_none() || files.contains(step)
      })
      .collect();
    self
      .run(steps, folder.into(), incremental, limit, cancel)
      .await
  }

  /// Rebuild the derived projections only; no CSV is read. Locations are
  /// rebuilt together with the documents they are derived alongside.
  pub async fn rebuild_cache(
    &self,
    documents: bool,
    fts_index: bool,
    cancel: &CancellationToken,
  ) -> Result<RunSummary> {
    let mut steps = Vec::new();
    if documents {
      steps.push(ImportStep::RebuildDocuments);
      steps.push(ImportStep::RebuildLocations);
    }
    if fts_index {
      steps.push(ImportStep::RebuildFts);
    }

    let baseline = self.store.table_count("enterprise").await?;
    let ctx = RunContext {
      folder:      PathBuf::from("."),
      incremental: false,
      limit:       None,
    };
    Pipeline::new(steps)
      .run(&self.store, &ctx, cancel, &self.reporter, baseline)
      .await
  }

  async fn run(
    &self,
    steps: Vec<ImportStep>,
    folder: PathBuf,
    incremental: bool,
    limit: Option<u64>,
    cancel: &CancellationToken,
  ) -> Result<RunSummary> {
    if !incremental && !self.store.is_empty().await? {
      return Err(Error::NotEmpty);
    }

    let baseline = baseline_estimate(&folder, incremental)?;
    let ctx = RunContext { folder, incremental, limit };
    Pipeline::new(steps)
      .run(&self.store, &ctx, cancel, &self.reporter, baseline)
      .await
  }
}

/// The enterprises-file estimate, or the mode's default.
fn baseline_estimate(folder: &Path, incremental: bool) -> Result<u64> {
  let (file, fallback) = if incremental {
    ("enterprise_insert.csv", INCREMENTAL_BASELINE)
  } else {
    ("enterprise.csv", FULL_BASELINE)
  };
  Ok(kbo_csv::estimate_row_count(&folder.join(file))?.unwrap_or(fallback))
}
