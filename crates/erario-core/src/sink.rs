//! The `Sink` trait and the record shape it accepts.
//!
//! The pipeline needs exactly one capability from storage: upsert a batch of
//! records into a named table, resolving conflicts on a given column set.
//! Backends live in other crates (`erario-store-sqlite`, the REST sink in
//! `erario-cli`).

use std::future::Future;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::Money;

// ─── Records ─────────────────────────────────────────────────────────────────

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Text(String),
  Int(i64),
  /// Written as the canonical decimal string, never as a float.
  Money(Money),
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Text(s) => serializer.serialize_str(s),
      Self::Int(i) => serializer.serialize_i64(*i),
      Self::Money(m) => m.serialize(serializer),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<Money> for Value {
  fn from(m: Money) -> Self { Self::Money(m) }
}

/// An ordered set of named column values. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(Vec<(&'static str, Value)>);

impl Record {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
    self.0.push((column, value.into()));
    self
  }

  pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ { self.0.iter().map(|(c, _)| *c) }

  pub fn values(&self) -> impl Iterator<Item = &Value> { self.0.iter().map(|(_, v)| v) }

  pub fn get(&self, column: &str) -> Option<&Value> {
    self.0.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
  }
}

impl Serialize for Record {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (column, value) in &self.0 {
      map.serialize_entry(column, value)?;
    }
    map.end()
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// A sink table and the columns its upserts resolve conflicts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
  pub name:     &'static str,
  pub conflict: &'static [&'static str],
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the tabular store the pipeline writes into.
///
/// `upsert` is insert-or-update on `table.conflict`. No transactions across
/// tables and no foreign-key enforcement are assumed. A batch either commits
/// or returns an error; callers never retry.
pub trait Sink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Upsert one batch of records into `table`.
  fn upsert<'a>(
    &'a self,
    table: &'a TableSpec,
    records: &'a [Record],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
