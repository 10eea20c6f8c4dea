//! [`SqliteStore`]: the SQLite implementation of [`Sink`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, types::Value as SqlValue};

use erario_core::{
  Money, Sink,
  dimension::{Dimension, DimensionKey, YEAR_COLUMN},
  sink::{Record, TableSpec},
  upsert::FACT_TABLE,
};

use crate::{
  Error, Result,
  encode::{encode_value, quote_identifier, upsert_sql},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A budget warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ─── Reads ─────────────────────────────────────────────────────────────────

  /// Number of rows in `table`.
  pub async fn row_count(&self, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?);
    let count = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get::<_, i64>(0))?))
      .await?;
    Ok(count.max(0) as u64)
  }

  /// Row hashes of every fact loaded for `year`, sorted.
  pub async fn fact_hashes(&self, year: i32) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT row_hash FROM {} WHERE {YEAR_COLUMN} = ?1 ORDER BY row_hash",
      FACT_TABLE.name
    );
    let hashes = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([year], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(hashes)
  }

  /// Exact `(accrued, budget)` totals for `year`.
  ///
  /// Amounts are stored as decimal text, so the sum happens here rather than
  /// in SQL.
  pub async fn fact_totals(&self, year: i32) -> Result<(Money, Money)> {
    let sql = format!(
      "SELECT credito_devengado, credito_vigente FROM {} WHERE {YEAR_COLUMN} = ?1",
      FACT_TABLE.name
    );
    let amounts = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([year], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(amounts.iter().fold((Money::ZERO, Money::ZERO), |(accrued, budget), (a, b)| {
      (accrued + Money::parse(a), budget + Money::parse(b))
    }))
  }

  /// Description of a dimension member: the current snapshot when `year` is
  /// `None`, the historical snapshot for that year otherwise.
  pub async fn description(&self, dim: Dimension, key: &DimensionKey, year: Option<i32>) -> Result<Option<String>> {
    let (table, columns) = match year {
      None => (dim.table(), dim.key_columns()),
      Some(_) => (dim.hist_table(), dim.hist_key_columns()),
    };

    let mut params: Vec<SqlValue> = key.parts().iter().map(|p| SqlValue::Text(p.clone())).collect();
    if let Some(year) = year {
      params.push(SqlValue::Integer(i64::from(year)));
    }

    let predicate = columns
      .iter()
      .enumerate()
      .map(|(i, c)| Ok(format!("{} = ?{}", quote_identifier(c)?, i + 1)))
      .collect::<Result<Vec<_>>>()?
      .join(" AND ");
    let sql = format!(
      "SELECT {} FROM {} WHERE {predicate}",
      quote_identifier(dim.desc_column())?,
      quote_identifier(table)?
    );

    let desc = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), |r| r.get::<_, String>(0))
            .optional()?,
        )
      })
      .await?;
    Ok(desc)
  }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Bound parameters for each record, in the column order of the first one.
fn encode_batch(table: &TableSpec, records: &[Record]) -> Result<(Vec<&'static str>, Vec<Vec<SqlValue>>)> {
  let Some(first) = records.first() else {
    return Ok((Vec::new(), Vec::new()));
  };
  let columns: Vec<&'static str> = first.columns().collect();

  if let Some(missing) = table.conflict.iter().find(|c| !columns.contains(c)) {
    return Err(Error::MissingConflictColumn {
      table:  table.name.to_owned(),
      column: (*missing).to_owned(),
    });
  }

  let rows = records
    .iter()
    .map(|record| {
      if !record.columns().eq(columns.iter().copied()) {
        return Err(Error::MixedColumns(table.name.to_owned()));
      }
      Ok(record.values().map(encode_value).collect())
    })
    .collect::<Result<Vec<_>>>()?;

  Ok((columns, rows))
}

impl Sink for SqliteStore {
  type Error = Error;

  /// One transaction per batch: the batch lands whole or not at all.
  async fn upsert(&self, table: &TableSpec, records: &[Record]) -> Result<()> {
    let (columns, rows) = encode_batch(table, records)?;
    if rows.is_empty() {
      return Ok(());
    }
    let sql = upsert_sql(table, &columns)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(&sql)?;
          for row in &rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(table = table.name, rows = records.len(), "sqlite batch committed");
    Ok(())
  }
}
