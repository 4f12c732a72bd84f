//! Pipeline progress events.
//!
//! The import pipeline is the sole producer; a single consumer (the terminal
//! renderer, or a test collector) receives events over a bounded channel.
//! Ordering contract, per run:
//!
//! ```text
//! Plan ≺ TaskPlanned(i) ≺ Progress(i)* ≺ TaskCompleted(i) ≺ … ≺ Completed
//! ```
//!
//! `Progress` is throttled at the producer; every other event is emitted
//! exactly once. The terminal `Completed` is emitted whether the run
//! succeeded, failed, or was cancelled.

use std::time::Duration;

use serde::Serialize;

/// One planned task inside a [`PipelineEvent::Plan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTask {
  pub label: String,
  pub estimated_rows: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
  /// Emitted once, before any task runs.
  Plan {
    folder:               String,
    incremental:          bool,
    limit:                Option<u64>,
    tasks:                Vec<PlannedTask>,
    total_estimated_rows: u64,
  },
  /// A task is about to execute.
  TaskPlanned {
    label:           String,
    estimated_total: Option<u64>,
  },
  /// Throttled progress inside a task.
  Progress {
    label:           String,
    processed:       u64,
    estimated_total: Option<u64>,
    elapsed:         Duration,
  },
  /// A task finished (successfully, with errors, or cancelled).
  TaskCompleted {
    label:     String,
    imported:  u64,
    deleted:   u64,
    /// Per-row error count; `-1` marks a missing source file.
    errors:    i64,
    duration:  Duration,
    cancelled: bool,
  },
  /// Terminal event; the channel closes after it.
  Completed {
    total_imported: u64,
    total_deleted:  u64,
    total_errors:   i64,
    duration:       Duration,
    cancelled:      bool,
  },
}

impl PipelineEvent {
  /// The task label this event belongs to, if any.
  pub fn label(&self) -> Option<&str> {
    match self {
      Self::TaskPlanned { label, .. }
      | Self::Progress { label, .. }
      | Self::TaskCompleted { label, .. } => Some(label),
      Self::Plan { .. } | Self::Completed { .. } => None,
    }
  }
}
