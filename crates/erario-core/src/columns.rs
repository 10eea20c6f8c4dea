//! Header normalization and the one place raw records become typed rows.
//!
//! Source headers vary in case, accents and punctuation between releases.
//! [`ColumnIndex`] resolves the columns the pipeline needs once per file;
//! [`ColumnIndex::row`] then maps each record into a [`BudgetRow`].

use csv::StringRecord;
use unicode_normalization::{UnicodeNormalization as _, char::is_combining_mark};

use crate::{
  Error, Money, Result,
  dimension::{Dimension, UNCLASSIFIED},
};

pub const MONTH_COLUMN: &str = "impacto_presupuestario_mes";
pub const ACCRUED_COLUMN: &str = "credito_devengado";
pub const BUDGET_COLUMN: &str = "credito_vigente";

/// Lowercase, strip accents, replace anything not `[a-z0-9_]` with `_`.
pub fn normalize_column_name(name: &str) -> String {
  name
    .trim()
    .trim_start_matches('\u{feff}')
    .trim()
    .to_lowercase()
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
    .collect()
}

/// Positions of the columns the pipeline reads, resolved from a header row.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
  month:    usize,
  ids:      [Option<usize>; 9],
  descs:    [Option<usize>; 9],
  accrued:  Option<usize>,
  budget:   Option<usize>,
}

impl ColumnIndex {
  /// Resolve columns from raw header names. Only the month column is
  /// required; other missing columns read as blank.
  pub fn from_headers<'h>(headers: impl IntoIterator<Item = &'h str>) -> Result<Self> {
    let names: Vec<String> = headers.into_iter().map(normalize_column_name).collect();
    let find = |column: &str| names.iter().position(|n| n == column);

    Ok(Self {
      month:   find(MONTH_COLUMN).ok_or(Error::MissingColumn(MONTH_COLUMN))?,
      ids:     Dimension::ALL.map(|d| find(d.id_column())),
      descs:   Dimension::ALL.map(|d| find(d.desc_column())),
      accrued: find(ACCRUED_COLUMN),
      budget:  find(BUDGET_COLUMN),
    })
  }

  /// Map one record. Short records are tolerated; absent fields read blank.
  pub fn row<'r>(&self, record: &'r StringRecord) -> BudgetRow<'r> {
    let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim);

    BudgetRow {
      month:   field(Some(self.month)).and_then(parse_month),
      ids:     self.ids.map(|i| field(i).filter(|s| !s.is_empty()).unwrap_or(UNCLASSIFIED)),
      descs:   self.descs.map(|i| field(i).unwrap_or_default()),
      accrued: Money::parse_opt(field(self.accrued)),
      budget:  Money::parse_opt(field(self.budget)),
    }
  }
}

/// Integral values only; `"7"`, `"07"` and `"7.0"` are all July.
fn parse_month(raw: &str) -> Option<u8> {
  let whole = match raw.split_once('.') {
    Some((whole, frac)) if frac.bytes().all(|b| b == b'0') => whole,
    Some(_) => return None,
    None => raw,
  };
  whole.parse::<u8>().ok().filter(|m| (1..=12).contains(m))
}

/// One source row, typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRow<'r> {
  /// `None` when the month is absent or outside 1–12.
  pub month:   Option<u8>,
  /// Identifiers by [`Dimension::index`]; blank fields are
  /// [`UNCLASSIFIED`].
  pub ids:     [&'r str; 9],
  /// Descriptions by [`Dimension::index`]; may be empty.
  pub descs:   [&'r str; 9],
  pub accrued: Money,
  pub budget:  Money,
}

impl BudgetRow<'_> {
  pub fn id(&self, dim: Dimension) -> &str { self.ids[dim.index()] }

  pub fn desc(&self, dim: Dimension) -> &str { self.descs[dim.index()] }
}
