//! Pipeline tests: files on disk, a local source and an in-memory sink with
//! upsert-by-key semantics.

use std::{
  collections::{BTreeMap, BTreeSet},
  io,
  path::{Path, PathBuf},
  sync::Mutex,
};

use tempfile::TempDir;

use crate::{
  Error, Sink, Source, Stage,
  aggregate::{TextEncoding, aggregate_file, aggregate_file_with},
  columns::normalize_column_name,
  dimension::{Dimension, DimensionKey},
  driver::{Driver, FailurePolicy, YearRange},
  sink::{Record, TableSpec, Value},
  upsert::FACT_TABLE,
};

const HEADER: &str = "Impacto_Presupuestario_Mes;Jurisdicción_ID;Jurisdicción_Desc;Servicio_ID;\
Servicio_Desc;Programa_ID;Programa_Desc;Subprograma_ID;Subprograma_Desc;Inciso_ID;Inciso_Desc;\
Ubicación_Geográfica_ID;Ubicación_Geográfica_Desc;Finalidad_ID;Finalidad_Desc;Función_ID;Función_Desc;\
Fuente_Financiamiento_ID;Fuente_Financiamiento_Desc;Crédito_Devengado;Crédito_Vigente";

fn line(month: &str, jur_desc: &str, accrued: &str, budget: &str) -> String {
  format!(
    "{month};20;{jur_desc};320;Servicio;16;Programa;0;Subprograma;1;Personal;2;CABA;3;Servicios;1;Salud;11;Tesoro;{accrued};{budget}\n"
  )
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, bytes).unwrap();
  path
}

fn utf8_file(dir: &Path, year: i32, lines: &[String]) -> PathBuf {
  let mut text = format!("{HEADER}\n");
  lines.iter().for_each(|l| text.push_str(l));
  write_file(dir, &format!("{year}.csv"), text.as_bytes())
}

/// Valid UTF-8 rows first, then a row with a Latin-1 `ó`.
fn latin1_bytes() -> Vec<u8> {
  let header = HEADER.split(';').map(normalize_column_name).collect::<Vec<_>>().join(";");
  let mut bytes = format!("{header}\n").into_bytes();
  bytes.extend_from_slice(line("1", "Ministerio", "100,50", "0").as_bytes());
  bytes.extend_from_slice(line("1", "Ministerio", "50,25", "10").as_bytes());
  bytes.extend_from_slice(&line("2", "Educaci\u{f3}n", "7", "0").chars().map(|c| c as u8).collect::<Vec<_>>());
  bytes
}

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Serves `{dir}/{year}.csv`; extraction is the identity.
struct LocalSource {
  dir: PathBuf,
}

impl Source for LocalSource {
  type Error = io::Error;

  async fn fetch(&self, year: i32) -> Result<PathBuf, io::Error> {
    let path = self.dir.join(format!("{year}.csv"));
    if path.exists() {
      Ok(path)
    } else {
      Err(io::Error::new(io::ErrorKind::NotFound, format!("no source for {year}")))
    }
  }

  async fn extract(&self, _year: i32, archive: &Path) -> Result<PathBuf, io::Error> { Ok(archive.to_path_buf()) }
}

fn cell(value: &Value) -> String {
  match value {
    Value::Text(s) => s.clone(),
    Value::Int(i) => i.to_string(),
    Value::Money(m) => m.to_string(),
  }
}

/// Table name → conflict-key values → record.
#[derive(Default)]
struct MemorySink {
  tables: Mutex<BTreeMap<&'static str, BTreeMap<Vec<String>, Record>>>,
}

impl MemorySink {
  fn rows(&self, table: &str) -> Vec<Record> {
    self.tables.lock().unwrap().get(table).map(|t| t.values().cloned().collect()).unwrap_or_default()
  }

  fn fact_hashes(&self) -> BTreeSet<String> {
    self.rows(FACT_TABLE.name).iter().filter_map(|r| r.get("row_hash").map(cell)).collect()
  }
}

impl Sink for MemorySink {
  type Error = io::Error;

  async fn upsert(&self, table: &TableSpec, records: &[Record]) -> Result<(), io::Error> {
    let mut tables = self.tables.lock().unwrap();
    let rows = tables.entry(table.name).or_default();
    for record in records {
      let key = table
        .conflict
        .iter()
        .map(|c| record.get(c).map(cell).ok_or_else(|| io::Error::other(format!("missing {c}"))))
        .collect::<io::Result<Vec<_>>>()?;
      rows.insert(key, record.clone());
    }
    Ok(())
  }
}

// ─── Encoding fallback ───────────────────────────────────────────────────────

#[test]
fn fallback_leaves_no_residue_from_failed_attempt() {
  let dir = TempDir::new().unwrap();
  let path = write_file(dir.path(), "mixed.csv", &latin1_bytes());

  let recovered = aggregate_file(&path, 2024).unwrap();
  let direct = aggregate_file_with(&path, 2024, TextEncoding::Latin1).unwrap();

  assert_eq!(recovered.encoding, TextEncoding::Latin1);
  assert_eq!(recovered.facts, direct.facts);
  assert_eq!(recovered.current, direct.current);
  assert_eq!(recovered.historical, direct.historical);
  assert_eq!(recovered.rows_total, 3);

  // The two January rows were seen by the failed UTF-8 attempt too; they
  // must only be counted once.
  let january = recovered.facts.iter().find(|(k, _)| k.month == 1).unwrap().1;
  assert_eq!(january.accrued.to_string(), "150.75");
  assert_eq!(
    recovered.current.get(Dimension::Jurisdiccion)[&DimensionKey::from(["20"])],
    "Educación"
  );
}

#[test]
fn header_without_month_is_fatal() {
  let dir = TempDir::new().unwrap();
  let path = write_file(dir.path(), "no-month.csv", b"a,b\n1,2\n");
  let err = aggregate_file(&path, 2024).unwrap_err();
  assert!(matches!(err, Error::MissingColumn(_)));
  assert!(!err.is_decode_failure());
}

#[test]
fn latin1_primary_has_no_fallback() {
  assert_eq!(TextEncoding::Latin1.fallback(), None);
  assert_eq!(TextEncoding::Utf8.fallback(), Some(TextEncoding::Latin1));
}

#[test]
fn utf8_file_uses_primary_encoding() {
  let dir = TempDir::new().unwrap();
  let path = utf8_file(dir.path(), 2024, &[line("3", "Ministerio de Economía", "1.000,5", "2.000")]);
  let agg = aggregate_file(&path, 2024).unwrap();
  assert_eq!(agg.encoding, TextEncoding::Utf8);
  assert_eq!(agg.facts.len(), 1);
  assert_eq!(
    agg.current.get(Dimension::Jurisdiccion)[&DimensionKey::from(["20"])],
    "Ministerio de Economía"
  );
}

// ─── Driver ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerun_is_idempotent() {
  let dir = TempDir::new().unwrap();
  utf8_file(dir.path(), 2023, &[line("1", "Min", "1", "2"), line("2", "Min", "3", "0")]);
  utf8_file(dir.path(), 2024, &[line("1", "Min", "5", "0"), line("13", "Min", "9", "9")]);

  let source = LocalSource { dir: dir.path().to_path_buf() };
  let sink = MemorySink::default();
  let driver = Driver::new(&source, &sink).batch_size(1);
  let range = YearRange::new(2023, 2024).unwrap();

  let first = driver.run(range).await.unwrap();
  assert!(first.is_success());
  assert_eq!(first.completed.len(), 2);
  assert_eq!(first.completed[1].rows_skipped, 1);
  let hashes = sink.fact_hashes();
  assert_eq!(hashes.len(), 3);

  driver.run(range).await.unwrap();
  assert_eq!(sink.fact_hashes(), hashes);
  assert_eq!(sink.rows(FACT_TABLE.name).len(), 3);
  assert_eq!(sink.rows("dim_jurisdiccion").len(), 1);
  assert_eq!(sink.rows("dim_jurisdiccion_hist").len(), 2);
}

#[tokio::test]
async fn historical_snapshots_keep_each_years_description() {
  let dir = TempDir::new().unwrap();
  utf8_file(dir.path(), 2023, &[line("1", "Ministerio de Hacienda", "1", "0")]);
  utf8_file(dir.path(), 2024, &[line("1", "Ministerio de Economía", "1", "0")]);

  let source = LocalSource { dir: dir.path().to_path_buf() };
  let sink = MemorySink::default();
  Driver::new(&source, &sink).run(YearRange::new(2023, 2024).unwrap()).await.unwrap();

  let current = sink.rows("dim_jurisdiccion");
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].get("jurisdiccion_desc"), Some(&Value::from("Ministerio de Economía")));

  let hist: Vec<_> = sink
    .rows("dim_jurisdiccion_hist")
    .iter()
    .map(|r| (r.get("ejercicio_presupuestario").map(cell), r.get("jurisdiccion_desc").map(cell)))
    .collect();
  assert_eq!(
    hist,
    [
      (Some("2023".into()), Some("Ministerio de Hacienda".into())),
      (Some("2024".into()), Some("Ministerio de Economía".into())),
    ]
  );
}

#[tokio::test]
async fn abort_policy_stops_at_first_failed_year() {
  let dir = TempDir::new().unwrap();
  utf8_file(dir.path(), 2022, &[line("1", "Min", "1", "0")]);
  utf8_file(dir.path(), 2024, &[line("1", "Min", "1", "0")]);

  let source = LocalSource { dir: dir.path().to_path_buf() };
  let sink = MemorySink::default();
  let err = Driver::new(&source, &sink).run(YearRange::new(2022, 2024).unwrap()).await.unwrap_err();

  assert!(matches!(err, Error::Year { year: 2023, stage: Stage::Fetch, .. }));
  // 2022 stays committed; 2024 was never reached.
  let years: BTreeSet<_> = sink
    .rows(FACT_TABLE.name)
    .iter()
    .filter_map(|r| r.get("ejercicio_presupuestario").map(cell))
    .collect();
  assert_eq!(years, BTreeSet::from(["2022".to_string()]));
}

#[tokio::test]
async fn keep_going_policy_collects_failures() {
  let dir = TempDir::new().unwrap();
  utf8_file(dir.path(), 2022, &[line("1", "Min", "1", "0")]);
  utf8_file(dir.path(), 2024, &[line("1", "Min", "1", "0")]);

  let source = LocalSource { dir: dir.path().to_path_buf() };
  let sink = MemorySink::default();
  let report = Driver::new(&source, &sink)
    .policy(FailurePolicy::KeepGoing)
    .run(YearRange::new(2022, 2024).unwrap())
    .await
    .unwrap();

  assert!(!report.is_success());
  assert_eq!(report.completed.iter().map(|r| r.year).collect::<Vec<_>>(), [2022, 2024]);
  assert_eq!(report.failed.len(), 1);
  assert!(matches!(report.failed[0], Error::Year { year: 2023, .. }));
}

#[tokio::test]
async fn aggregation_errors_are_attributed_to_their_stage() {
  let dir = TempDir::new().unwrap();
  write_file(dir.path(), "2024.csv", b"jurisdiccion_id;credito_devengado\n20;1\n");

  let source = LocalSource { dir: dir.path().to_path_buf() };
  let sink = MemorySink::default();
  let err = Driver::new(&source, &sink).run_year(2024).await.unwrap_err();
  match err {
    Error::Year { year, stage, source } => {
      assert_eq!((year, stage), (2024, Stage::Aggregate));
      assert!(source.to_string().contains("impacto_presupuestario_mes"));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(sink.rows(FACT_TABLE.name).is_empty());
}
