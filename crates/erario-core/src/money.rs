//! Exact fixed-point monetary amounts.
//!
//! Amounts are held as an `i128` scaled by 10^8, so summing millions of rows
//! never introduces rounding error. Parsing is locale-tolerant and never
//! fails: the source data is third-party, and a garbage field is worth zero.

use std::{
  fmt,
  iter::Sum,
  ops::{Add, AddAssign, Neg},
};

use serde::{Serialize, Serializer};

/// Number of fractional decimal digits kept.
pub const SCALE: u32 = 8;

const FACTOR: i128 = 10_i128.pow(SCALE);

/// Longest integer part accepted, leading zeros aside. Larger fields are
/// garbage; at this bound `i128` holds the sum of 10^10 maximal values.
pub const MAX_INT_DIGITS: usize = 20;

/// A monetary amount in fixed point, scaled by 10^[`SCALE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i128);

impl Money {
  pub const ZERO: Self = Self(0);

  pub const fn from_scaled(scaled: i128) -> Self { Self(scaled) }

  /// The raw value, scaled by 10^[`SCALE`].
  pub const fn scaled(self) -> i128 { self.0 }

  pub const fn is_zero(self) -> bool { self.0 == 0 }

  /// Parse a locale-formatted amount.
  ///
  /// Accepts `"1.234,56"` (dot thousands, comma decimal), `"1234,56"` and the
  /// canonical `"1234.56"`. Everything except digits, separators and signs is
  /// stripped first. Empty or malformed input yields [`Money::ZERO`].
  /// Fractional digits beyond the eighth are truncated. An integer part
  /// longer than [`MAX_INT_DIGITS`] is treated as malformed.
  pub fn parse(raw: &str) -> Self { parse_scaled(raw).map(Self).unwrap_or(Self::ZERO) }

  /// [`Money::parse`] for an optional field; a missing field is zero.
  pub fn parse_opt(raw: Option<&str>) -> Self { raw.map(Self::parse).unwrap_or(Self::ZERO) }
}

fn parse_scaled(raw: &str) -> Option<i128> {
  let mut s: String = raw
    .trim()
    .chars()
    .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    .collect();
  if s.is_empty() {
    return Some(0);
  }

  if s.contains(',') {
    if s.contains('.') {
      s.retain(|c| c != '.');
    }
    s = s.replacen(',', ".", 1);
  }

  let (negative, unsigned) = match s.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, s.strip_prefix('+').unwrap_or(&s)),
  };

  let mut parts = unsigned.split('.');
  let int_part = parts.next().unwrap_or("").trim_start_matches('0');
  if int_part.len() > MAX_INT_DIGITS {
    return None;
  }
  let frac_part = parts.next().unwrap_or("");

  let int_value = if int_part.is_empty() { 0 } else { digits(int_part)? };

  let frac_digits = &frac_part[..frac_part.len().min(SCALE as usize)];
  let frac_value = if frac_digits.is_empty() {
    0
  } else {
    digits(frac_digits)? * 10_i128.pow(SCALE - frac_digits.len() as u32)
  };

  let magnitude = int_value.checked_mul(FACTOR)?.checked_add(frac_value)?;
  Some(if negative { -magnitude } else { magnitude })
}

fn digits(s: &str) -> Option<i128> {
  if !s.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  s.parse().ok()
}

/// Shortest canonical form: `.` as decimal point, no thousands separator,
/// trailing fractional zeros removed, no decimal point for whole amounts.
impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    let factor = FACTOR as u128;
    let int_part = abs / factor;
    let frac_part = abs % factor;

    if frac_part == 0 {
      return write!(f, "{sign}{int_part}");
    }
    let frac = format!("{frac_part:0width$}", width = SCALE as usize);
    write!(f, "{sign}{int_part}.{}", frac.trim_end_matches('0'))
  }
}

impl Serialize for Money {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl Add for Money {
  type Output = Self;

  fn add(self, rhs: Self) -> Self { Self(self.0 + rhs.0) }
}

impl AddAssign for Money {
  fn add_assign(&mut self, rhs: Self) { self.0 += rhs.0; }
}

impl Neg for Money {
  type Output = Self;

  fn neg(self) -> Self { Self(-self.0) }
}

impl Sum for Money {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self { iter.fold(Self::ZERO, Add::add) }
}
