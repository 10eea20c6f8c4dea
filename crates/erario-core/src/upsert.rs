//! Turns a [`YearAggregate`] into content-addressed records and drives the
//! batched upserts: current dimensions, then historical dimensions, then
//! facts.

use tracing::{debug, info};

use crate::{
  Error, Result,
  aggregate::YearAggregate,
  dimension::{Dimension, DimensionKey, DimensionMap, YEAR_COLUMN},
  sink::{Record, Sink, TableSpec},
};

/// Upper bound on records per sink request.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub const FACT_TABLE: TableSpec = TableSpec {
  name:     "fact_credito_devengado_mensual",
  conflict: &[YEAR_COLUMN, "row_hash"],
};

/// Name stamped into each fact's `source_file` column.
pub fn source_file_name(year: i32) -> String { format!("credito-mensual-{year}") }

// ─── Record builders ─────────────────────────────────────────────────────────

pub fn current_table(dim: Dimension) -> TableSpec {
  TableSpec { name: dim.table(), conflict: dim.key_columns() }
}

pub fn historical_table(dim: Dimension) -> TableSpec {
  TableSpec { name: dim.hist_table(), conflict: dim.hist_key_columns() }
}

/// Entries sorted by key so repeated runs emit identical batches.
fn sorted(map: &DimensionMap) -> Vec<(&DimensionKey, &String)> {
  let mut entries: Vec<_> = map.iter().collect();
  entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
  entries
}

fn dimension_record(dim: Dimension, parts: &[String]) -> Record {
  dim
    .key_columns()
    .iter()
    .zip(parts)
    .fold(Record::new(), |record, (column, id)| record.with(*column, id.as_str()))
}

pub fn current_dimension_records(agg: &YearAggregate, dim: Dimension) -> Vec<Record> {
  sorted(agg.current.get(dim))
    .into_iter()
    .map(|(key, desc)| dimension_record(dim, key.parts()).with(dim.desc_column(), desc.as_str()))
    .collect()
}

pub fn historical_dimension_records(agg: &YearAggregate, dim: Dimension) -> Vec<Record> {
  sorted(agg.historical.get(dim))
    .into_iter()
    .map(|(key, desc)| {
      dimension_record(dim, key.parts())
        .with(YEAR_COLUMN, i64::from(agg.year))
        .with(dim.desc_column(), desc.as_str())
    })
    .collect()
}

pub fn fact_records(agg: &YearAggregate) -> Vec<Record> {
  let mut entries: Vec<_> = agg.facts.iter().collect();
  entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

  let source_file = source_file_name(agg.year);
  entries
    .into_iter()
    .map(|(key, amounts)| {
      let record = Record::new()
        .with(YEAR_COLUMN, i64::from(agg.year))
        .with("impacto_presupuestario_mes", i64::from(key.month));
      Dimension::ALL
        .iter()
        .fold(record, |record, dim| record.with(dim.id_column(), key.id(*dim)))
        .with("credito_devengado", amounts.accrued)
        .with("credito_vigente", amounts.budget)
        .with("source_file", source_file.as_str())
        .with("row_hash", key.row_hash(agg.year))
    })
    .collect()
}

// ─── Upserts ─────────────────────────────────────────────────────────────────

/// Upsert `records` in sequential batches of at most `batch_size`.
///
/// The first failing batch aborts the call; batches before it stay
/// committed and the error reports how many.
pub async fn upsert_batches<S: Sink>(
  sink: &S,
  table: &TableSpec,
  records: &[Record],
  batch_size: usize,
) -> Result<usize> {
  for (batch, chunk) in records.chunks(batch_size.max(1)).enumerate() {
    debug!(table = table.name, batch, size = chunk.len(), "upserting batch");
    sink.upsert(table, chunk).await.map_err(|e| Error::Sink {
      table: table.name.to_owned(),
      batch,
      committed: batch,
      source: Box::new(e),
    })?;
  }
  Ok(records.len())
}

/// Records written per table, in upsert order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
  pub tables: Vec<(&'static str, usize)>,
}

impl UpsertSummary {
  pub fn records(&self, table: &str) -> Option<usize> {
    self.tables.iter().find(|(t, _)| *t == table).map(|(_, n)| *n)
  }

  pub fn total(&self) -> usize { self.tables.iter().map(|(_, n)| n).sum() }
}

/// Write one year's aggregate: the nine current dimensions, the nine
/// historical dimensions, then the facts.
pub async fn upsert_year<S: Sink>(sink: &S, agg: &YearAggregate, batch_size: usize) -> Result<UpsertSummary> {
  let mut summary = UpsertSummary::default();

  info!(year = agg.year, "upserting current dimensions");
  for dim in Dimension::ALL {
    let table = current_table(dim);
    let written = upsert_batches(sink, &table, &current_dimension_records(agg, dim), batch_size).await?;
    summary.tables.push((table.name, written));
  }

  info!(year = agg.year, "upserting historical dimensions");
  for dim in Dimension::ALL {
    let table = historical_table(dim);
    let written = upsert_batches(sink, &table, &historical_dimension_records(agg, dim), batch_size).await?;
    summary.tables.push((table.name, written));
  }

  info!(year = agg.year, keys = agg.facts.len(), "upserting facts");
  let written = upsert_batches(sink, &FACT_TABLE, &fact_records(agg), batch_size).await?;
  summary.tables.push((FACT_TABLE.name, written));

  Ok(summary)
}
