//! Year-range driver: acquire → aggregate → upsert, one year at a time.

use std::ops::RangeInclusive;

use tracing::{error, info};

use crate::{
  Error, Result, Sink, Source, Stage,
  aggregate::{TextEncoding, aggregate_file},
  delimiter::Delimiter,
  upsert::{DEFAULT_BATCH_SIZE, UpsertSummary, upsert_year},
};

/// An inclusive, validated range of fiscal years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
  from: i32,
  to:   i32,
}

impl YearRange {
  pub fn new(from: i32, to: i32) -> Result<Self> {
    if from > to {
      return Err(Error::InvalidRange { from, to });
    }
    Ok(Self { from, to })
  }

  pub fn years(&self) -> RangeInclusive<i32> { self.from..=self.to }
}

/// What to do with the rest of the range after a year fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Stop at the first failed year.
  #[default]
  Abort,
  /// Record the failure and move on to the next year.
  KeepGoing,
}

/// Outcome of one successfully loaded year.
#[derive(Debug, Clone)]
pub struct YearReport {
  pub year:         i32,
  pub delimiter:    Delimiter,
  pub encoding:     TextEncoding,
  pub rows_total:   u64,
  pub rows_skipped: u64,
  pub fact_keys:    usize,
  pub upserted:     UpsertSummary,
}

/// Outcome of a whole range.
#[derive(Debug, Default)]
pub struct RangeReport {
  pub completed: Vec<YearReport>,
  /// Only populated under [`FailurePolicy::KeepGoing`].
  pub failed:    Vec<Error>,
}

impl RangeReport {
  pub fn is_success(&self) -> bool { self.failed.is_empty() }
}

/// Drives the per-year pipeline against a [`Source`] and a [`Sink`].
pub struct Driver<'a, Src, Snk> {
  source:     &'a Src,
  sink:       &'a Snk,
  batch_size: usize,
  policy:     FailurePolicy,
}

impl<'a, Src: Source, Snk: Sink> Driver<'a, Src, Snk> {
  pub fn new(source: &'a Src, sink: &'a Snk) -> Self {
    Self { source, sink, batch_size: DEFAULT_BATCH_SIZE, policy: FailurePolicy::default() }
  }

  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn policy(mut self, policy: FailurePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Process every year of `range` in ascending order.
  ///
  /// Under [`FailurePolicy::Abort`] the first failed year's error is
  /// returned. Years already completed stay committed either way.
  pub async fn run(&self, range: YearRange) -> Result<RangeReport> {
    let mut report = RangeReport::default();
    for year in range.years() {
      match self.run_year(year).await {
        Ok(year_report) => report.completed.push(year_report),
        Err(e) => {
          error!(year, error = %e, "year failed");
          match self.policy {
            FailurePolicy::Abort => return Err(e),
            FailurePolicy::KeepGoing => report.failed.push(e),
          }
        }
      }
    }
    Ok(report)
  }

  /// Run the full pipeline for one year. All in-memory state for the year
  /// is dropped before this returns.
  pub async fn run_year(&self, year: i32) -> Result<YearReport> {
    info!(year, "processing year");

    let archive = self
      .source
      .fetch(year)
      .await
      .map_err(|e| Error::Year { year, stage: Stage::Fetch, source: Box::new(e) })?;

    let table = self
      .source
      .extract(year, &archive)
      .await
      .map_err(|e| Error::Year { year, stage: Stage::Extract, source: Box::new(e) })?;
    info!(year, path = %table.display(), "tabular file ready");

    let agg = tokio::task::spawn_blocking(move || aggregate_file(&table, year))
      .await
      .map_err(Error::from)
      .and_then(|r| r)
      .map_err(|e| e.in_year(year, Stage::Aggregate))?;
    info!(
      year,
      delimiter = %agg.delimiter,
      encoding = %agg.encoding,
      rows = agg.rows_total,
      skipped = agg.rows_skipped,
      keys = agg.facts.len(),
      "aggregated"
    );

    let upserted = upsert_year(self.sink, &agg, self.batch_size)
      .await
      .map_err(|e| e.in_year(year, Stage::Upsert))?;
    info!(year, records = upserted.total(), facts = agg.facts.len(), "year loaded");

    Ok(YearReport {
      year,
      delimiter: agg.delimiter,
      encoding: agg.encoding,
      rows_total: agg.rows_total,
      rows_skipped: agg.rows_skipped,
      fact_keys: agg.facts.len(),
      upserted,
    })
  }
}
