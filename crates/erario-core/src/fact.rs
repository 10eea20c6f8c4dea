//! Fact grain and measures.

use sha1::{Digest, Sha1};

use crate::{
  Money,
  dimension::{Dimension, DimensionIds},
};

/// Aggregation grain within one fiscal year: month plus the nine dimension
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrainKey {
  pub month: u8,
  pub ids:   DimensionIds,
}

impl GrainKey {
  pub fn id(&self, dim: Dimension) -> &str { self.ids.get(dim) }

  /// Deterministic content hash used as the fact's idempotency key.
  ///
  /// Lowercase hex SHA-1 over `year|month|id|id|…` in grain order; rows
  /// already in the sink were keyed with exactly this digest.
  pub fn row_hash(&self, year: i32) -> String {
    let mut hasher = Sha1::new();
    hasher.update(year.to_string());
    hasher.update(b"|");
    hasher.update(self.month.to_string());
    for id in self.ids.iter() {
      hasher.update(b"|");
      hasher.update(id);
    }
    hex::encode(hasher.finalize())
  }
}

/// Summed measures for one grain key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactAmounts {
  /// Accrued ("devengado").
  pub accrued: Money,
  /// Current budget ("vigente").
  pub budget:  Money,
}

impl FactAmounts {
  pub fn new(accrued: Money, budget: Money) -> Self { Self { accrued, budget } }

  pub fn is_zero(&self) -> bool { self.accrued.is_zero() && self.budget.is_zero() }

  pub fn add(&mut self, other: FactAmounts) {
    self.accrued += other.accrued;
    self.budget += other.budget;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(month: u8, ids: [&str; 9]) -> GrainKey {
    GrainKey { month, ids: DimensionIds::new(ids.map(str::to_owned)) }
  }

  #[test]
  fn row_hash_is_sha1_of_pipe_joined_grain() {
    let k = key(3, ["20", "320", "16", "0", "1", "2", "3", "1", "11"]);
    let expected = {
      let mut h = Sha1::new();
      h.update("2024|3|20|320|16|0|1|2|3|1|11");
      hex::encode(h.finalize())
    };
    assert_eq!(k.row_hash(2024), expected);
    assert_eq!(k.row_hash(2024).len(), 40);
  }

  #[test]
  fn row_hash_depends_on_year_and_every_id() {
    let base = key(1, ["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    assert_ne!(base.row_hash(2023), base.row_hash(2024));

    let mut other = base.clone();
    other.month = 2;
    assert_ne!(base.row_hash(2024), other.row_hash(2024));

    let swapped = key(1, ["1", "2", "3", "4", "5", "6", "7", "9", "8"]);
    assert_ne!(base.row_hash(2024), swapped.row_hash(2024));
  }

  #[test]
  fn amounts_accumulate() {
    let mut acc = FactAmounts::new(Money::parse("100,50"), Money::ZERO);
    acc.add(FactAmounts::new(Money::parse("50,25"), Money::parse("1")));
    assert_eq!(acc.accrued.scaled(), 15_075_000_000);
    assert_eq!(acc.budget, Money::parse("1"));
    assert!(!acc.is_zero());
    assert!(FactAmounts::default().is_zero());
  }
}
