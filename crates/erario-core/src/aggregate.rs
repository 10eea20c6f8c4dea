//! Streaming aggregation of one year's tabular file.
//!
//! Records are streamed, never buffered; only the per-key sums and the
//! dimension snapshots are held in memory. A file that does not decode under
//! the primary encoding is re-read from the start under the fallback
//! encoding, with all state from the failed attempt discarded.

use std::{collections::HashMap, fmt, fs::File, io, path::Path};

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  columns::{BudgetRow, ColumnIndex},
  delimiter::{Delimiter, sniff_delimiter},
  dimension::{Dimension, DimensionIds, DimensionMaps},
  fact::{FactAmounts, GrainKey},
};

// ─── Encodings ───────────────────────────────────────────────────────────────

/// Text encodings a source file may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
  Utf8,
  /// Decoded as windows-1252, the WHATWG meaning of "latin1".
  Latin1,
}

impl TextEncoding {
  /// The encoding to retry with after this one fails, if any.
  pub fn fallback(self) -> Option<Self> {
    match self {
      Self::Utf8 => Some(Self::Latin1),
      Self::Latin1 => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Utf8 => "utf-8",
      Self::Latin1 => "latin1",
    }
  }

  fn encoding(self) -> &'static Encoding {
    match self {
      Self::Utf8 => UTF_8,
      Self::Latin1 => WINDOWS_1252,
    }
  }

  fn decode_record(self, raw: &ByteRecord, record: u64) -> Result<StringRecord> {
    let encoding = self.encoding();
    let mut out = StringRecord::with_capacity(raw.as_slice().len(), raw.len());
    for field in raw {
      let text = encoding
        .decode_without_bom_handling_and_without_replacement(field)
        .ok_or(Error::Decode { encoding: self.name(), record })?;
      out.push_field(&text);
    }
    Ok(out)
  }
}

impl fmt::Display for TextEncoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Everything one year's pass produces.
#[derive(Debug, Clone)]
pub struct YearAggregate {
  pub year:         i32,
  pub delimiter:    Delimiter,
  /// The encoding the successful pass used.
  pub encoding:     TextEncoding,
  /// Data rows seen, skipped rows included.
  pub rows_total:   u64,
  /// Rows dropped for lacking a valid month.
  pub rows_skipped: u64,
  /// Sparse: only keys with at least one non-zero measure.
  pub facts:        HashMap<GrainKey, FactAmounts>,
  /// Latest description per natural key.
  pub current:      DimensionMaps,
  /// Description per natural key as of `year`.
  pub historical:   DimensionMaps,
}

// ─── Fold ────────────────────────────────────────────────────────────────────

/// The per-row fold. Owned by a single pass and dropped with it.
#[derive(Debug)]
pub struct Aggregator {
  year:         i32,
  rows_total:   u64,
  rows_skipped: u64,
  facts:        HashMap<GrainKey, FactAmounts>,
  current:      DimensionMaps,
  historical:   DimensionMaps,
}

impl Aggregator {
  pub fn new(year: i32) -> Self {
    Self {
      year,
      rows_total: 0,
      rows_skipped: 0,
      facts: HashMap::new(),
      current: DimensionMaps::default(),
      historical: DimensionMaps::default(),
    }
  }

  pub fn push(&mut self, row: &BudgetRow<'_>) {
    self.rows_total += 1;

    let Some(month) = row.month else {
      self.rows_skipped += 1;
      return;
    };

    let ids = DimensionIds::new(row.ids.map(str::to_owned));

    let amounts = FactAmounts::new(row.accrued, row.budget);
    if !amounts.is_zero() {
      let key = GrainKey { month, ids: ids.clone() };
      self.facts.entry(key).or_default().add(amounts);
    }

    for dim in Dimension::ALL {
      let desc = row.desc(dim);
      if desc.is_empty() {
        continue;
      }
      self.current.upsert(dim, ids.key(dim), desc);
      self.historical.upsert(dim, ids.key(dim), desc);
    }
  }

  pub fn rows_total(&self) -> u64 { self.rows_total }

  pub fn fact_count(&self) -> usize { self.facts.len() }

  /// Drop everything accumulated so far.
  pub fn clear(&mut self) {
    self.rows_total = 0;
    self.rows_skipped = 0;
    self.facts.clear();
    self.current.clear();
    self.historical.clear();
  }

  pub fn finish(self, delimiter: Delimiter, encoding: TextEncoding) -> YearAggregate {
    YearAggregate {
      year: self.year,
      delimiter,
      encoding,
      rows_total: self.rows_total,
      rows_skipped: self.rows_skipped,
      facts: self.facts,
      current: self.current,
      historical: self.historical,
    }
  }
}

// ─── File passes ─────────────────────────────────────────────────────────────

enum Pass {
  AttemptingPrimaryEncoding(TextEncoding),
  AttemptingFallbackEncoding(TextEncoding),
  Done(YearAggregate),
  Failed(Error),
}

/// Aggregate `path` for `year`, reading UTF-8 first and Latin-1 on failure.
pub fn aggregate_file(path: &Path, year: i32) -> Result<YearAggregate> {
  aggregate_file_with(path, year, TextEncoding::Utf8)
}

/// Aggregate `path` starting from `primary`. At most one fallback attempt is
/// made, and only for decode or parse failures.
pub fn aggregate_file_with(path: &Path, year: i32, primary: TextEncoding) -> Result<YearAggregate> {
  let delimiter = sniff_delimiter(path)?;
  let mut agg = Aggregator::new(year);
  let mut pass = Pass::AttemptingPrimaryEncoding(primary);

  loop {
    pass = match pass {
      Pass::AttemptingPrimaryEncoding(encoding) => {
        match run_pass(path, delimiter, encoding, &mut agg) {
          Ok(()) => Pass::Done(take(&mut agg, year).finish(delimiter, encoding)),
          Err(e) if e.is_decode_failure() => match encoding.fallback() {
            Some(next) => {
              warn!(year, %encoding, fallback = %next, error = %e, "parse failed; retrying with fallback encoding");
              agg.clear();
              Pass::AttemptingFallbackEncoding(next)
            }
            None => Pass::Failed(e),
          },
          Err(e) => Pass::Failed(e),
        }
      }
      Pass::AttemptingFallbackEncoding(encoding) => {
        match run_pass(path, delimiter, encoding, &mut agg) {
          Ok(()) => Pass::Done(take(&mut agg, year).finish(delimiter, encoding)),
          Err(e) => Pass::Failed(e),
        }
      }
      Pass::Done(result) => return Ok(result),
      Pass::Failed(e) => return Err(e),
    };
  }
}

fn take(agg: &mut Aggregator, year: i32) -> Aggregator { std::mem::replace(agg, Aggregator::new(year)) }

fn run_pass(path: &Path, delimiter: Delimiter, encoding: TextEncoding, agg: &mut Aggregator) -> Result<()> {
  let file = File::open(path).map_err(|e| Error::io(path, e))?;
  aggregate_reader(file, delimiter, encoding, agg)?;
  debug!(
    path = %path.display(),
    %encoding,
    rows = agg.rows_total(),
    keys = agg.fact_count(),
    "pass complete"
  );
  Ok(())
}

/// Fold every record of `reader` into `agg`.
pub fn aggregate_reader<R: io::Read>(
  reader: R,
  delimiter: Delimiter,
  encoding: TextEncoding,
  agg: &mut Aggregator,
) -> Result<()> {
  let mut csv = ReaderBuilder::new()
    .delimiter(delimiter.as_byte())
    .flexible(true)
    .has_headers(true)
    .from_reader(reader);

  let headers = encoding.decode_record(csv.byte_headers()?, 0)?;
  let columns = ColumnIndex::from_headers(headers.iter())?;

  let mut raw = ByteRecord::new();
  let mut record_no = 0;
  while csv.read_byte_record(&mut raw)? {
    record_no += 1;
    let record = encoding.decode_record(&raw, record_no)?;
    agg.push(&columns.row(&record));
  }
  Ok(())
}
