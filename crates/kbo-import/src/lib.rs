//! The KBO import pipeline.
//!
//! An [`Importer`] wires an ordered list of steps over a
//! [`SqliteStore`](kbo_store_sqlite::SqliteStore): the nine CSV loads, then
//! the document, location, and full-text projections. Progress flows as
//! [`PipelineEvent`](kbo_core::event::PipelineEvent)s through a bounded
//! channel to a single consumer; cancellation is cooperative via
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and rolls back
//! the step it lands in.

pub mod cache;
pub mod error;
pub mod impacted;
pub mod mapper;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod steps;

pub use error::{Error, Result};
pub use orchestrator::Importer;
pub use pipeline::{RunContext, RunSummary, StepOutcome, StepState};
pub use progress::Reporter;
pub use steps::ImportStep;
