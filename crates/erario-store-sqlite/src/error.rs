//! Error type for `erario-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("invalid sql identifier: {0:?}")]
  InvalidIdentifier(String),

  #[error("record in {table} is missing conflict column {column}")]
  MissingConflictColumn { table: String, column: String },

  #[error("records in one batch for {0} do not share a column layout")]
  MixedColumns(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
