//! The progress reporter — the pipeline's only output channel.
//!
//! Events are produced synchronously (some from the database connection
//! thread) and rendered asynchronously by a single consumer. The channel is
//! bounded: a slow renderer backpressures the pipeline instead of piling up
//! events. `Progress` is coalesced at the producer to one event per 250 ms
//! per task; all other events pass through unconditionally.

use std::time::{Duration, Instant};

use kbo_core::event::PipelineEvent;
use tokio::sync::mpsc;

/// Minimum spacing between two `Progress` events of one task.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

const CHANNEL_CAPACITY: usize = 256;

/// Producer half; cheap to clone.
#[derive(Clone)]
pub struct Reporter {
  tx: mpsc::Sender<PipelineEvent>,
}

impl Reporter {
  /// Create a reporter and the receiver its consumer drains.
  pub fn channel() -> (Self, mpsc::Receiver<PipelineEvent>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (Self { tx }, rx)
  }

  /// Emit from async context. A dropped consumer is not an error: the run
  /// continues unobserved.
  pub async fn emit(&self, event: PipelineEvent) {
    let _ = self.tx.send(event).await;
  }

  /// Hand out the throttled per-task progress emitter; it is moved onto the
  /// connection thread for the duration of the step.
  pub fn task_progress(
    &self,
    label: &str,
    estimated_total: Option<u64>,
  ) -> TaskProgress {
    TaskProgress {
      tx: self.tx.clone(),
      label: label.to_owned(),
      estimated_total,
      started: Instant::now(),
      // Backdated so the first update emits immediately.
      last_emit: Instant::now()
        .checked_sub(PROGRESS_INTERVAL)
        .unwrap_or_else(Instant::now),
    }
  }
}

/// Blocking, throttled `Progress` emitter for one task.
pub struct TaskProgress {
  tx:              mpsc::Sender<PipelineEvent>,
  label:           String,
  estimated_total: Option<u64>,
  started:         Instant,
  last_emit:       Instant,
}

impl TaskProgress {
  /// Called at record boundaries on the connection thread. Blocking on a
  /// full channel is deliberate — see the module docs.
  pub fn update(&mut self, processed: u64) {
    if self.last_emit.elapsed() < PROGRESS_INTERVAL {
      return;
    }
    self.last_emit = Instant::now();
    let _ = self.tx.blocking_send(PipelineEvent::Progress {
      label:           self.label.clone(),
      processed,
      estimated_total: self.estimated_total,
      elapsed:         self.started.elapsed(),
    });
  }

  /// Time since the task started, for the completion event.
  pub fn elapsed(&self) -> Duration { self.started.elapsed() }
}
