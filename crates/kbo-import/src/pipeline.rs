//! The pipeline engine — strictly sequential steps with a lifecycle of
//! `Pending → InProgress → {Completed | Failed | Cancelled}`.
//!
//! Per step: emit `TaskPlanned`, execute with a stopwatch, emit
//! `TaskCompleted`. A cancelled step rolls back its transaction and marks
//! every remaining step `Cancelled` without planning it; a failed step
//! stops the run. Either way the terminal `Completed` event is emitted
//! before the engine returns.

use std::{
  path::PathBuf,
  sync::Arc,
  time::{Duration, Instant},
};

use kbo_core::event::{PipelineEvent, PlannedTask};
use kbo_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;

use crate::{Result, cache::CodeCache, impacted, progress::Reporter, steps::ImportStep};

// ─── Run inputs ──────────────────────────────────────────────────────────────

/// Immutable parameters of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunContext {
  pub folder:      PathBuf,
  pub incremental: bool,
  /// Optional cap on records read per source file.
  pub limit:       Option<u64>,
}

/// Mutable state shared across steps of one run.
#[derive(Default)]
pub struct RunState {
  cache: Option<Arc<CodeCache>>,
}

impl RunState {
  /// The run's code cache, loaded on first use — that is, right after the
  /// codes step has put the vocabulary in place — and immutable after.
  pub async fn code_cache(&mut self, store: &SqliteStore) -> Result<Arc<CodeCache>> {
    if let Some(cache) = &self.cache {
      return Ok(cache.clone());
    }
    let cache = Arc::new(store.with_connection(|conn| Ok(CodeCache::load(conn))).await??);
    self.cache = Some(cache.clone());
    Ok(cache)
  }
}

// ─── Step results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
  Pending,
  InProgress,
  Completed,
  Failed,
  Cancelled,
}

/// What one step did. `errors == -1` marks a missing source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcome {
  pub imported:  u64,
  pub deleted:   u64,
  pub errors:    i64,
  pub cancelled: bool,
}

impl StepOutcome {
  pub fn missing_file() -> Self {
    Self { errors: -1, ..Self::default() }
  }
}

#[derive(Debug, Clone)]
pub struct StepReport {
  pub label:    &'static str,
  pub state:    StepState,
  pub outcome:  StepOutcome,
  pub duration: Duration,
}

/// Aggregate of a finished (or stopped) run.
#[derive(Debug, Clone)]
pub struct RunSummary {
  pub imported:  u64,
  pub deleted:   u64,
  /// Sum of per-row error counts (missing-file markers excluded).
  pub errors:    i64,
  pub duration:  Duration,
  pub cancelled: bool,
  pub steps:     Vec<StepReport>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
  steps: Vec<ImportStep>,
}

impl Pipeline {
  pub fn new(steps: Vec<ImportStep>) -> Self { Self { steps } }

  /// Run all steps in order. `baseline` feeds the plan's row estimates for
  /// the derivation steps.
  pub async fn run(
    &self,
    store: &SqliteStore,
    ctx: &RunContext,
    cancel: &CancellationToken,
    reporter: &Reporter,
    baseline: u64,
  ) -> Result<RunSummary> {
    let started = Instant::now();

    // Plan: per-step estimates, emitted before anything executes.
    let mut estimates = Vec::with_capacity(self.steps.len());
    for step in &self.steps {
      estimates.push(step.estimate(ctx, baseline)?);
    }
    let tasks: Vec<PlannedTask> = self
      .steps
      .iter()
      .zip(&estimates)
      .map(|(step, estimate)| PlannedTask {
        label:          step.label().to_owned(),
        estimated_rows: *estimate,
      })
      .collect();
    reporter
      .emit(PipelineEvent::Plan {
        folder:               ctx.folder.display().to_string(),
        incremental:          ctx.incremental,
        limit:                ctx.limit,
        tasks,
        total_estimated_rows: estimates.iter().flatten().sum(),
      })
      .await;

    if ctx.incremental {
      store
        .with_connection(|conn| Ok(impacted::reset(conn)))
        .await??;
    }

    let mut state = RunState::default();
    let mut reports: Vec<StepReport> = self
      .steps
      .iter()
      .map(|step| StepReport {
        label:    step.label(),
        state:    StepState::Pending,
        outcome:  StepOutcome::default(),
        duration: Duration::ZERO,
      })
      .collect();

    let mut summary = RunSummary {
      imported:  0,
      deleted:   0,
      errors:    0,
      duration:  Duration::ZERO,
      cancelled: false,
      steps:     Vec::new(),
    };
    let mut failure: Option<crate::Error> = None;

    for (index, step) in self.steps.iter().enumerate() {
      // Cancellation is polled between steps: remaining steps are marked
      // without being planned.
      if cancel.is_cancelled() {
        summary.cancelled = true;
        for report in &mut reports[index..] {
          report.state = StepState::Cancelled;
        }
        break;
      }

      let estimate = estimates[index];
      reporter
        .emit(PipelineEvent::TaskPlanned {
          label:           step.label().to_owned(),
          estimated_total: estimate,
        })
        .await;

      reports[index].state = StepState::InProgress;
      let progress = reporter.task_progress(step.label(), estimate);
      let step_started = Instant::now();
      let result = step.execute(store, ctx, &mut state, cancel, progress).await;
      let duration = step_started.elapsed();

      let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
          tracing::error!(step = step.label(), error = %e, "step failed");
          failure = Some(e);
          StepOutcome { errors: 1, ..StepOutcome::default() }
        }
      };

      reports[index].outcome = outcome;
      reports[index].duration = duration;
      reports[index].state = if failure.is_some() {
        StepState::Failed
      } else if outcome.cancelled {
        StepState::Cancelled
      } else {
        StepState::Completed
      };

      summary.imported += outcome.imported;
      summary.deleted += outcome.deleted;
      summary.errors += outcome.errors.max(0);

      reporter
        .emit(PipelineEvent::TaskCompleted {
          label:     step.label().to_owned(),
          imported:  outcome.imported,
          deleted:   outcome.deleted,
          errors:    outcome.errors,
          duration,
          cancelled: outcome.cancelled,
        })
        .await;

      if outcome.cancelled {
        summary.cancelled = true;
        for report in &mut reports[index + 1..] {
          report.state = StepState::Cancelled;
        }
        break;
      }
      if failure.is_some() {
        break;
      }
    }

    summary.duration = started.elapsed();
    summary.steps = reports;

    reporter
      .emit(PipelineEvent::Completed {
        total_imported: summary.imported,
        total_deleted:  summary.deleted,
        total_errors:   summary.errors,
        duration:       summary.duration,
        cancelled:      summary.cancelled,
      })
      .await;

    match failure {
      Some(e) => Err(e),
      None => Ok(summary),
    }
  }
}
