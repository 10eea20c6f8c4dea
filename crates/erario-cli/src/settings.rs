//! Layered run configuration: defaults, then an optional TOML file, then
//! `ERARIO_*` environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use erario_core::{
  driver::{FailurePolicy, YearRange},
  ipc::DEFAULT_SERIES_ID,
  upsert::DEFAULT_BATCH_SIZE,
};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://dgsiaf-repo.mecon.gob.ar/repository/pa/datasets";
pub const DEFAULT_DATASET: &str = "credito-mensual";

/// Environment fallbacks for the REST sink, most specific first.
const URL_VARS: &[&str] = &["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
const KEY_VARS: &[&str] = &["SUPABASE_SERVICE_ROLE_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

/// Which [`erario_core::Sink`] a run writes into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
  /// A local SQLite file.
  #[default]
  Sqlite,
  /// A PostgREST endpoint such as Supabase.
  Rest,
}

impl SinkKind {
  fn as_str(self) -> &'static str {
    match self {
      Self::Sqlite => "sqlite",
      Self::Rest => "rest",
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
  pub base_url:    String,
  pub dataset:     String,
  pub raw_dir:     PathBuf,
  pub extract_dir: PathBuf,
  pub batch_size:  usize,
  pub from:        i32,
  pub to:          i32,
  pub keep_going:  bool,
  pub sink:        SinkKind,
  pub sqlite_path: PathBuf,
  pub rest_url:    Option<String>,
  pub rest_key:    Option<String>,
  pub ipc_series:  String,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Default)]
pub struct Overrides {
  pub from:        Option<i32>,
  pub to:          Option<i32>,
  pub keep_going:  bool,
  pub sink:        Option<SinkKind>,
  pub sqlite_path: Option<PathBuf>,
  pub batch_size:  Option<u32>,
  pub ipc_series:  Option<String>,
}

/// Credentials for the REST sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCredentials {
  pub url: String,
  pub key: String,
}

impl EtlConfig {
  pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
    let path_str = |p: &PathBuf| p.to_string_lossy().into_owned();

    let settings = config::Config::builder()
      .set_default("base_url", DEFAULT_BASE_URL)?
      .set_default("dataset", DEFAULT_DATASET)?
      .set_default("raw_dir", "data/raw")?
      .set_default("extract_dir", "data/extracted")?
      .set_default("batch_size", DEFAULT_BATCH_SIZE as i64)?
      .set_default("from", 2014_i64)?
      .set_default("to", 2026_i64)?
      .set_default("keep_going", false)?
      .set_default("sink", SinkKind::default().as_str())?
      .set_default("sqlite_path", "data/erario.db")?
      .set_default("ipc_series", DEFAULT_SERIES_ID)?
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ERARIO")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .set_override_option("from", overrides.from.map(i64::from))?
      .set_override_option("to", overrides.to.map(i64::from))?
      .set_override_option("keep_going", overrides.keep_going.then_some(true))?
      .set_override_option("sink", overrides.sink.map(SinkKind::as_str))?
      .set_override_option("sqlite_path", overrides.sqlite_path.as_ref().map(path_str))?
      .set_override_option("batch_size", overrides.batch_size.map(i64::from))?
      .set_override_option("ipc_series", overrides.ipc_series.clone())?
      .build()
      .with_context(|| format!("failed to read configuration from {}", path.display()))?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise configuration")?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      bail!("batch_size must be at least 1");
    }
    Ok(())
  }

  pub fn range(&self) -> Result<YearRange> {
    YearRange::new(self.from, self.to).context("invalid year range")
  }

  pub fn policy(&self) -> FailurePolicy {
    if self.keep_going { FailurePolicy::KeepGoing } else { FailurePolicy::Abort }
  }

  /// REST credentials, falling back to the conventional Supabase variables
  /// looked up through `env`, in order. Missing either one is an error.
  pub fn rest_credentials(&self, env: impl Fn(&str) -> Option<String>) -> Result<RestCredentials> {
    let pick = |own: &Option<String>, vars: &[&str]| {
      own
        .iter()
        .cloned()
        .chain(vars.iter().filter_map(|var| env(*var)))
        .map(|v| v.trim().to_owned())
        .find(|v| !v.is_empty())
    };

    match (pick(&self.rest_url, URL_VARS), pick(&self.rest_key, KEY_VARS)) {
      (Some(url), Some(key)) => Ok(RestCredentials { url, key }),
      (None, _) => bail!("REST sink selected but no URL configured (rest_url, {})", URL_VARS.join(", ")),
      (_, None) => bail!("REST sink selected but no key configured (rest_key, {})", KEY_VARS.join(", ")),
    }
  }
}
