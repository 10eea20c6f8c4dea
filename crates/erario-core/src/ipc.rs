//! Monthly consumer-price-index series, used downstream to deflate amounts.
//!
//! The series API returns `[period, value]` pairs; values are run through the
//! same decimal codec as budget amounts.

use serde::Deserialize;

use crate::{
  Money,
  sink::{Record, TableSpec},
};

pub const DEFAULT_SERIES_ID: &str = "145.3_INGNACNAL_DICI_M_15";
pub const SERIES_API_URL: &str = "https://apis.datos.gob.ar/series/api/series/";
pub const BASE: &str = "dic-2016=100";
pub const FUENTE: &str = "apis.datos.gob.ar (INDEC)";

pub const IPC_TABLE: TableSpec = TableSpec { name: "ipc_indice_mensual", conflict: &["periodo"] };

/// The subset of the series API response that is loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesResponse {
  #[serde(default)]
  pub meta: Option<serde_json::Value>,
  #[serde(default)]
  pub data: Vec<(Option<String>, serde_json::Value)>,
}

/// Plain decimal text for a JSON number. `f64`'s `Display` never uses
/// exponent notation, unlike the JSON serializer (`1e-5`).
fn number_text(n: &serde_json::Number) -> String {
  match (n.as_i64(), n.as_u64(), n.as_f64()) {
    (Some(i), _, _) => i.to_string(),
    (_, Some(u), _) => u.to_string(),
    (_, _, Some(f)) => f.to_string(),
    _ => n.to_string(),
  }
}

fn index_value(raw: &serde_json::Value) -> Option<Money> {
  match raw {
    serde_json::Value::String(s) => Some(Money::parse(s)),
    serde_json::Value::Number(n) => Some(Money::parse(&number_text(n))),
    _ => None,
  }
}

/// One record per data point; points without a period or value are dropped.
pub fn ipc_records(response: &SeriesResponse) -> Vec<Record> {
  response
    .data
    .iter()
    .filter_map(|(period, value)| {
      let period = period.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
      let index = index_value(value)?;
      Some(
        Record::new()
          .with("periodo", period)
          .with("ipc_indice", index)
          .with("fuente", FUENTE)
          .with("base", BASE),
      )
    })
    .collect()
}
