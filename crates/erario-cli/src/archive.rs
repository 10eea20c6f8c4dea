//! [`HttpArchiveSource`]: downloads each year's zip archive over HTTP and
//! unpacks its tabular file, caching both on disk.

use std::{
  fs::File,
  io,
  path::{Path, PathBuf},
  time::Duration,
};

use erario_core::{
  Source,
  source::{archive_file_name, archive_url},
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncWriteExt as _;
use tracing::info;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("request to {url} failed")]
  Http {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} answered {status}")]
  Status { url: String, status: StatusCode },

  #[error("i/o error at {path}")]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot read archive {path}")]
  Zip {
    path:   PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("archive {0} has no .csv entry")]
  NoCsv(PathBuf),

  #[error("extraction task failed")]
  Task(#[from] tokio::task::JoinError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> SourceError + '_ {
  move |source| SourceError::Io { path: path.to_path_buf(), source }
}

/// Fetches `{base_url}/{year}/{dataset}-{year}.zip` into `raw_dir` and
/// extracts it under `extract_dir/{year}/`.
#[derive(Clone)]
pub struct HttpArchiveSource {
  client:      Client,
  base_url:    String,
  dataset:     String,
  raw_dir:     PathBuf,
  extract_dir: PathBuf,
}

impl HttpArchiveSource {
  pub fn new(
    base_url: impl Into<String>,
    dataset: impl Into<String>,
    raw_dir: impl Into<PathBuf>,
    extract_dir: impl Into<PathBuf>,
  ) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(600))
      .build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
      dataset: dataset.into(),
      raw_dir: raw_dir.into(),
      extract_dir: extract_dir.into(),
    })
  }

  fn archive_path(&self, year: i32) -> PathBuf { self.raw_dir.join(archive_file_name(&self.dataset, year)) }

  /// Stream the body to `{dest}.part`, then rename into place.
  async fn download(&self, url: &str, dest: &Path) -> Result<(), SourceError> {
    let http = |source| SourceError::Http { url: url.to_owned(), source };

    let mut resp = self.client.get(url).send().await.map_err(http)?;
    if !resp.status().is_success() {
      return Err(SourceError::Status { url: url.to_owned(), status: resp.status() });
    }

    let part = dest.with_extension("zip.part");
    let mut file = tokio::fs::File::create(&part).await.map_err(io_err(&part))?;
    while let Some(chunk) = resp.chunk().await.map_err(http)? {
      file.write_all(&chunk).await.map_err(io_err(&part))?;
    }
    file.flush().await.map_err(io_err(&part))?;
    drop(file);

    tokio::fs::rename(&part, dest).await.map_err(io_err(dest))
  }
}

impl Source for HttpArchiveSource {
  type Error = SourceError;

  async fn fetch(&self, year: i32) -> Result<PathBuf, SourceError> {
    let dest = self.archive_path(year);
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
      info!(year, path = %dest.display(), "archive cached");
      return Ok(dest);
    }

    tokio::fs::create_dir_all(&self.raw_dir).await.map_err(io_err(&self.raw_dir))?;
    let url = archive_url(&self.base_url, &self.dataset, year);
    info!(year, %url, "downloading archive");
    self.download(&url, &dest).await?;
    Ok(dest)
  }

  async fn extract(&self, year: i32, archive: &Path) -> Result<PathBuf, SourceError> {
    let archive = archive.to_path_buf();
    let out_dir = self.extract_dir.join(year.to_string());
    tokio::task::spawn_blocking(move || extract_first_csv(&archive, &out_dir)).await?
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Unpack the first `.csv` entry of `archive` into `out_dir`. An entry that
/// was already extracted is reused as is.
pub fn extract_first_csv(archive: &Path, out_dir: &Path) -> Result<PathBuf, SourceError> {
  let zip_err = |source| SourceError::Zip { path: archive.to_path_buf(), source };

  let file = File::open(archive).map_err(io_err(archive))?;
  let mut zip = ZipArchive::new(file).map_err(zip_err)?;

  for index in 0..zip.len() {
    let mut entry = zip.by_index(index).map_err(zip_err)?;
    if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".csv") {
      continue;
    }
    // Entries that would escape `out_dir` are ignored.
    let Some(relative) = entry.enclosed_name() else {
      continue;
    };

    let target = out_dir.join(relative);
    if target.exists() {
      info!(path = %target.display(), "reusing extracted file");
      return Ok(target);
    }

    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let part = target.with_extension("csv.part");
    let mut out = File::create(&part).map_err(io_err(&part))?;
    io::copy(&mut entry, &mut out).map_err(io_err(&part))?;
    drop(out);
    std::fs::rename(&part, &target).map_err(io_err(&target))?;

    info!(path = %target.display(), "extracted");
    return Ok(target);
  }

  Err(SourceError::NoCsv(archive.to_path_buf()))
}
