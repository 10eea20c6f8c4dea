//! Encoding helpers between sink records and SQLite statements and values.
//!
//! Identifiers come from static table specs but are still validated before
//! being spliced into SQL. Monetary values are bound as canonical decimal
//! text.

use erario_core::sink::{TableSpec, Value};
use rusqlite::types::Value as SqlValue;

use crate::{Error, Result};

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Int(i) => SqlValue::Integer(*i),
    Value::Money(m) => SqlValue::Text(m.to_string()),
  }
}

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub fn quote_identifier(name: &str) -> Result<String> {
  let valid = !name.is_empty()
    && name
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
  if !valid {
    return Err(Error::InvalidIdentifier(name.to_owned()));
  }
  Ok(format!("\"{name}\""))
}

fn quote_all(names: &[&str]) -> Result<Vec<String>> {
  names.iter().map(|n| quote_identifier(n)).collect()
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// `INSERT … ON CONFLICT (<conflict>) DO UPDATE` over `columns`; every
/// non-key column takes the incoming value.
pub fn upsert_sql(table: &TableSpec, columns: &[&str]) -> Result<String> {
  let table_name = quote_identifier(table.name)?;
  let quoted = quote_all(columns)?;
  let conflict = quote_all(table.conflict)?;

  let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  let updates: Vec<String> = columns
    .iter()
    .zip(&quoted)
    .filter(|(c, _)| !table.conflict.contains(c))
    .map(|(_, q)| format!("{q} = excluded.{q}"))
    .collect();

  let action = if updates.is_empty() {
    "DO NOTHING".to_owned()
  } else {
    format!("DO UPDATE SET {}", updates.join(", "))
  };

  Ok(format!(
    "INSERT INTO {table_name} ({}) VALUES ({}) ON CONFLICT ({}) {action}",
    quoted.join(", "),
    placeholders.join(", "),
    conflict.join(", "),
  ))
}
