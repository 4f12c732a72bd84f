//! `kbo` binary.
//!
//! Three subcommands over one database file:
//!
//! - `kbo import <folder>` — load a monthly bundle (add `--incremental` for
//!   an update drop) and rebuild the projections.
//! - `kbo rebuild` — regenerate documents and/or the full-text index from
//!   the relational tables; no CSV is read.
//! - `kbo serve` — serve the JSON read API. Settings come from
//!   `config.toml` and `KBO_`-prefixed environment variables.

mod render;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kbo_import::{Importer, Reporter, RunSummary};
use kbo_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "KBO registry importer and search service")]
struct Cli {
  /// Path to the SQLite database file.
  #[arg(short, long, default_value = "kbo.db", global = true)]
  database: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Import a bundle of registry CSV files.
  Import {
    /// Folder containing the CSV files.
    folder: PathBuf,

    /// Apply `<table>_delete.csv` / `<table>_insert.csv` pairs instead of
    /// replacing table contents.
    #[arg(long)]
    incremental: bool,

    /// Read at most this many records per file.
    #[arg(long)]
    limit: Option<u64>,
  },

  /// Rebuild derived projections from the relational tables.
  Rebuild {
    /// Rebuild the company documents (and the location projection).
    #[arg(long)]
    documents: bool,

    /// Rebuild the full-text index.
    #[arg(long)]
    fts: bool,
  },

  /// Serve the JSON read API.
  Serve {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
  },
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host: String,
  #[serde(default = "default_port")]
  port: u16,
  #[serde(default)]
  database: Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::Import { folder, incremental, limit } => {
      let store = open_store(&cli.database).await?;
      let summary = run_import(store, |importer, cancel| async move {
        importer.full_import(folder, incremental, limit, &cancel).await
      })
      .await?;
      report(&summary);
    }

    Command::Rebuild { documents, fts } => {
      if !documents && !fts {
        anyhow::bail!("nothing to rebuild; pass --documents and/or --fts");
      }
      let store = open_store(&cli.database).await?;
      let summary = run_import(store, |importer, cancel| async move {
        importer.rebuild_cache(documents, fts, &cancel).await
      })
      .await?;
      report(&summary);
    }

    Command::Serve { config } => {
      let settings = config::Config::builder()
        .add_source(config::File::from(config).required(false))
        .add_source(config::Environment::with_prefix("KBO"))
        .build()
        .context("failed to read config file")?;
      let server_cfg: ServerConfig = settings
        .try_deserialize()
        .context("failed to deserialise ServerConfig")?;

      let database = server_cfg.database.unwrap_or(cli.database);
      let store = open_store(&database).await?;

      let app = kbo_api::router(store);
      let address = format!("{}:{}", server_cfg.host, server_cfg.port);
      tracing::info!("listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
      axum::serve(listener, app).await.context("server error")?;
    }
  }

  Ok(())
}

async fn open_store(path: &Path) -> anyhow::Result<SqliteStore> {
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))
}

/// Wire reporter, renderer, and Ctrl-C cancellation around one import call.
async fn run_import<F, Fut>(store: SqliteStore, run: F) -> anyhow::Result<RunSummary>
where
  F: FnOnce(Importer, CancellationToken) -> Fut,
  Fut: Future<Output = kbo_import::Result<RunSummary>>,
{
  let (reporter, events) = Reporter::channel();
  let renderer = tokio::spawn(render::render(events));

  let cancel = CancellationToken::new();
  let ctrl_c = {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("cancellation requested, rolling back the running step");
        cancel.cancel();
      }
    })
  };

  let importer = Importer::new(store, reporter);
  let result = run(importer, cancel).await;

  ctrl_c.abort();
  let _ = renderer.await;

  result.context("import failed")
}

fn report(summary: &RunSummary) {
  for step in &summary.steps {
    tracing::debug!(
      step = step.label,
      state = ?step.state,
      imported = step.outcome.imported,
      deleted = step.outcome.deleted,
      errors = step.outcome.errors,
      duration = ?step.duration,
      "step finished"
    );
  }
}
