//! Terminal rendering of the pipeline event stream — one progress bar per
//! task, driven entirely by events; the renderer never touches the store.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use kbo_core::event::PipelineEvent;
use tokio::sync::mpsc;

pub async fn render(mut events: mpsc::Receiver<PipelineEvent>) {
  let multi = MultiProgress::new();
  let style = ProgressStyle::with_template(
    "{prefix:>28} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
  )
  .unwrap_or_else(|_| ProgressStyle::default_bar())
  .progress_chars("=> ");
  let mut bars: HashMap<String, ProgressBar> = HashMap::new();

  while let Some(event) = events.recv().await {
    match event {
      PipelineEvent::Plan { folder, incremental, tasks, total_estimated_rows, .. } => {
        let mode = if incremental { "incremental" } else { "full" };
        tracing::info!(
          folder,
          mode,
          tasks = tasks.len(),
          estimated_rows = total_estimated_rows,
          "import planned"
        );
      }
      PipelineEvent::TaskPlanned { label, estimated_total } => {
        let bar = multi.add(ProgressBar::new(estimated_total.unwrap_or(0)));
        bar.set_style(style.clone());
        bar.set_prefix(label.clone());
        bars.insert(label, bar);
      }
      PipelineEvent::Progress { label, processed, estimated_total, .. } => {
        if let Some(bar) = bars.get(&label) {
          if let Some(total) = estimated_total {
            // Estimates can undershoot; keep the bar monotonic.
            bar.set_length(total.max(processed));
          }
          bar.set_position(processed);
        }
      }
      PipelineEvent::TaskCompleted { label, imported, deleted, errors, cancelled, .. } => {
        if let Some(bar) = bars.remove(&label) {
          let message = if cancelled {
            "cancelled".to_owned()
          } else if errors < 0 {
            "file missing, skipped".to_owned()
          } else {
            format!("{imported} imported, {deleted} deleted, {errors} errors")
          };
          bar.finish_with_message(message);
        }
      }
      PipelineEvent::Completed {
        total_imported,
        total_deleted,
        total_errors,
        duration,
        cancelled,
      } => {
        if cancelled {
          tracing::warn!(?duration, "import cancelled");
        } else {
          tracing::info!(
            imported = total_imported,
            deleted = total_deleted,
            errors = total_errors,
            ?duration,
            "import finished"
          );
        }
      }
    }
  }
}
