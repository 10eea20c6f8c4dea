//! `erario`: loads the national budget's monthly accrued-credit datasets
//! into a star schema.
//!
//! # Usage
//!
//! ```
//! erario load --from 2020 --to 2024
//! erario --config erario.toml load --sink rest --keep-going
//! erario inspect data/extracted/2024/credito-mensual-2024.csv
//! erario ipc
//! ```

mod archive;
mod rest;
mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use archive::HttpArchiveSource;
use clap::{Parser, Subcommand};
use erario_core::{
  Sink,
  aggregate::{YearAggregate, aggregate_file},
  driver::{Driver, RangeReport},
  ipc::{IPC_TABLE, SERIES_API_URL, SeriesResponse, ipc_records},
  upsert::upsert_batches,
};
use erario_store_sqlite::SqliteStore;
use rest::RestSink;
use settings::{EtlConfig, Overrides, SinkKind};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "erario", version, about = "Budget execution loader")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", env = "ERARIO_CONFIG", default_value = "erario.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Download, aggregate and upsert a range of fiscal years.
  Load {
    #[arg(long)]
    from:        Option<i32>,
    #[arg(long)]
    to:          Option<i32>,
    /// Continue with the next year after a failure.
    #[arg(long)]
    keep_going:  bool,
    #[arg(long, value_enum)]
    sink:        Option<SinkKind>,
    #[arg(long, value_name = "PATH")]
    sqlite_path: Option<PathBuf>,
    /// Records per upsert request.
    #[arg(long)]
    batch_size:  Option<u32>,
  },

  /// Aggregate a local file and print its summary without writing anywhere.
  Inspect {
    file: PathBuf,
    /// Fiscal year; guessed from the file name when omitted.
    #[arg(long)]
    year: Option<i32>,
  },

  /// Load the monthly consumer price index series.
  Ipc {
    #[arg(long)]
    series_id: Option<String>,
    #[arg(long, value_enum)]
    sink:      Option<SinkKind>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  dotenv::from_filename(".env.local").ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  match args.command {
    Command::Load { from, to, keep_going, sink, sqlite_path, batch_size } => {
      let overrides = Overrides { from, to, keep_going, sink, sqlite_path, batch_size, ..Default::default() };
      let cfg = EtlConfig::load(&args.config, &overrides)?;
      match cfg.sink {
        SinkKind::Sqlite => load(&cfg, &open_sqlite(&cfg).await?).await,
        SinkKind::Rest => load(&cfg, &open_rest(&cfg)?).await,
      }
    }
    Command::Inspect { file, year } => inspect(&file, year).await,
    Command::Ipc { series_id, sink } => {
      let overrides = Overrides { sink, ipc_series: series_id, ..Default::default() };
      let cfg = EtlConfig::load(&args.config, &overrides)?;
      match cfg.sink {
        SinkKind::Sqlite => load_ipc(&cfg, &open_sqlite(&cfg).await?).await,
        SinkKind::Rest => load_ipc(&cfg, &open_rest(&cfg)?).await,
      }
    }
  }
}

async fn open_sqlite(cfg: &EtlConfig) -> Result<SqliteStore> {
  if let Some(parent) = cfg.sqlite_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(&cfg.sqlite_path)
    .await
    .with_context(|| format!("failed to open store at {}", cfg.sqlite_path.display()))
}

fn open_rest(cfg: &EtlConfig) -> Result<RestSink> {
  let creds = cfg.rest_credentials(|var| std::env::var(var).ok())?;
  RestSink::new(creds).context("failed to build HTTP client")
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn load<S: Sink>(cfg: &EtlConfig, sink: &S) -> Result<()> {
  let range = cfg.range()?;
  let source = HttpArchiveSource::new(&cfg.base_url, &cfg.dataset, &cfg.raw_dir, &cfg.extract_dir)
    .context("failed to build HTTP client")?;

  let report = Driver::new(&source, sink)
    .batch_size(cfg.batch_size)
    .policy(cfg.policy())
    .run(range)
    .await?;

  print_range(&report);
  if !report.is_success() {
    let years: Vec<String> = report.failed.iter().map(ToString::to_string).collect();
    bail!("{} year(s) failed:\n  {}", years.len(), years.join("\n  "));
  }
  Ok(())
}

async fn inspect(file: &Path, year: Option<i32>) -> Result<()> {
  let year = year.or_else(|| year_from_file_name(file)).unwrap_or_default();
  let path = file.to_path_buf();
  let agg = tokio::task::spawn_blocking(move || aggregate_file(&path, year))
    .await
    .context("aggregation task failed")?
    .with_context(|| format!("failed to aggregate {}", file.display()))?;
  print_aggregate(&agg);
  Ok(())
}

async fn load_ipc<S: Sink>(cfg: &EtlConfig, sink: &S) -> Result<()> {
  let response: SeriesResponse = reqwest::Client::new()
    .get(SERIES_API_URL)
    .query(&[("ids", cfg.ipc_series.as_str()), ("format", "json")])
    .send()
    .await
    .context("series request failed")?
    .error_for_status()
    .context("series API returned an error")?
    .json()
    .await
    .context("deserialising series response")?;

  let records = ipc_records(&response);
  if records.is_empty() {
    warn!(series = %cfg.ipc_series, "series returned no data points");
    return Ok(());
  }

  let written = upsert_batches(sink, &IPC_TABLE, &records, cfg.batch_size).await?;
  info!(series = %cfg.ipc_series, records = written, "ipc series loaded");
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// First run of four digits in the file name, e.g. `credito-mensual-2024.csv`.
fn year_from_file_name(path: &Path) -> Option<i32> {
  let name = path.file_name()?.to_str()?;
  name
    .as_bytes()
    .windows(4)
    .position(|w| w.iter().all(u8::is_ascii_digit))
    .and_then(|at| name[at..at + 4].parse().ok())
}

fn print_aggregate(agg: &YearAggregate) {
  println!("year:          {}", agg.year);
  println!("delimiter:     {}", agg.delimiter);
  println!("encoding:      {}", agg.encoding);
  println!("rows:          {}", agg.rows_total);
  println!("rows skipped:  {}", agg.rows_skipped);
  println!("fact keys:     {}", agg.facts.len());
  println!("dimensions:    {}", agg.current.len());
}

fn print_range(report: &RangeReport) {
  for year in &report.completed {
    println!(
      "{}  delimiter={} encoding={} rows={} skipped={} keys={} upserted={}",
      year.year,
      year.delimiter,
      year.encoding,
      year.rows_total,
      year.rows_skipped,
      year.fact_keys,
      year.upserted.total(),
    );
  }
}
