//! The `Source` trait: where each year's tabular file comes from.
//!
//! Implemented by the HTTP archive source in `erario-cli`; tests use a local
//! directory.

use std::{
  future::Future,
  path::{Path, PathBuf},
};

/// Provider of one tabular file per fiscal year.
///
/// Both stages are expected to cache by year so that re-runs skip work
/// already done.
pub trait Source: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Make the year's archive available locally and return its path.
  fn fetch(&self, year: i32) -> impl Future<Output = Result<PathBuf, Self::Error>> + Send + '_;

  /// Unpack `archive` and return the path of the single tabular file in it.
  fn extract<'a>(
    &'a self,
    year: i32,
    archive: &'a Path,
  ) -> impl Future<Output = Result<PathBuf, Self::Error>> + Send + 'a;
}

/// Archive URL for `year`: `{base}/{year}/{dataset}-{year}.zip`.
pub fn archive_url(base: &str, dataset: &str, year: i32) -> String {
  format!("{}/{year}/{dataset}-{year}.zip", base.trim_end_matches('/'))
}

/// File name an archive for `year` is cached under.
pub fn archive_file_name(dataset: &str, year: i32) -> String { format!("{dataset}-{year}.zip") }
