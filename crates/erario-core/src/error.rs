//! Error types for `erario-core`.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Boxed error from an external collaborator (a [`Source`](crate::Source)
/// or a [`Sink`](crate::Sink)).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The per-year pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetch,
  Extract,
  Aggregate,
  Upsert,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Fetch => "fetch",
      Self::Extract => "extract",
      Self::Aggregate => "aggregate",
      Self::Upsert => "upsert",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("record {record} is not valid {encoding}")]
  Decode {
    encoding: &'static str,
    record:   u64,
  },

  #[error("required column {0:?} is missing from the header")]
  MissingColumn(&'static str),

  #[error("upsert into {table} failed at batch {batch} ({committed} batches committed): {source}")]
  Sink {
    table:     String,
    batch:     usize,
    committed: usize,
    #[source]
    source:    BoxError,
  },

  #[error("invalid year range: from {from} is after to {to}")]
  InvalidRange { from: i32, to: i32 },

  #[error("year {year} failed during {stage}: {source}")]
  Year {
    year:   i32,
    stage:  Stage,
    #[source]
    source: BoxError,
  },

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }

  /// Whether a fresh pass under another text encoding could succeed where
  /// this attempt failed.
  pub fn is_decode_failure(&self) -> bool {
    match self {
      Self::Decode { .. } => true,
      Self::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
      _ => false,
    }
  }

  /// Attribute this error to a stage of a given year.
  pub fn in_year(self, year: i32, stage: Stage) -> Self {
    match self {
      already @ Self::Year { .. } => already,
      other => Self::Year { year, stage, source: Box::new(other) },
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
