//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::{
  io,
  path::{Path, PathBuf},
};

use erario_core::{
  Money, Sink, Source,
  dimension::{Dimension, DimensionKey},
  driver::{Driver, YearRange},
  ipc::{IPC_TABLE, SeriesResponse, ipc_records},
  sink::Record,
  upsert::{FACT_TABLE, current_table, historical_table},
};
use tempfile::TempDir;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

const HEADER: &str = "impacto_presupuestario_mes,jurisdiccion_id,jurisdiccion_desc,servicio_id,\
servicio_desc,programa_id,programa_desc,subprograma_id,subprograma_desc,inciso_id,inciso_desc,\
ubicacion_geografica_id,ubicacion_geografica_desc,finalidad_id,finalidad_desc,funcion_id,funcion_desc,\
fuente_financiamiento_id,fuente_financiamiento_desc,credito_devengado,credito_vigente";

fn row(month: u8, servicio: &str, desc: &str, accrued: &str) -> String {
  format!(
    "{month},20,{desc},{servicio},Servicio,16,Programa,0,,1,Personal,2,CABA,3,Salud,1,Salud,11,Tesoro,{accrued},0\n"
  )
}

fn write_year(dir: &Path, year: i32, rows: &[String]) {
  let mut text = format!("{HEADER}\n");
  rows.iter().for_each(|r| text.push_str(r));
  std::fs::write(dir.join(format!("{year}.csv")), text).unwrap();
}

/// Serves `{dir}/{year}.csv` as an already extracted file.
struct DirSource(PathBuf);

impl Source for DirSource {
  type Error = io::Error;

  async fn fetch(&self, year: i32) -> Result<PathBuf, io::Error> {
    let path = self.0.join(format!("{year}.csv"));
    std::fs::metadata(&path)?;
    Ok(path)
  }

  async fn extract(&self, _year: i32, archive: &Path) -> Result<PathBuf, io::Error> { Ok(archive.to_path_buf()) }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_creates_every_table() {
  let s = store().await;
  for dim in Dimension::ALL {
    assert_eq!(s.row_count(dim.table()).await.unwrap(), 0);
    assert_eq!(s.row_count(dim.hist_table()).await.unwrap(), 0);
  }
  assert_eq!(s.row_count(FACT_TABLE.name).await.unwrap(), 0);
  assert_eq!(s.row_count(IPC_TABLE.name).await.unwrap(), 0);
}

#[tokio::test]
async fn reopening_a_file_keeps_data() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("erario.db");

  let s = SqliteStore::open(&path).await.unwrap();
  let table = current_table(Dimension::Inciso);
  s.upsert(&table, &[Record::new().with("inciso_id", "1").with("inciso_desc", "Personal")])
    .await
    .unwrap();
  drop(s);

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.row_count("dim_inciso").await.unwrap(), 1);
}

// ─── Upserts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_overwrites_non_key_columns() {
  let s = store().await;
  let table = current_table(Dimension::Jurisdiccion);
  let key = DimensionKey::from(["20"]);

  s.upsert(&table, &[Record::new().with("jurisdiccion_id", "20").with("jurisdiccion_desc", "Hacienda")])
    .await
    .unwrap();
  s.upsert(&table, &[Record::new().with("jurisdiccion_id", "20").with("jurisdiccion_desc", "Economía")])
    .await
    .unwrap();

  assert_eq!(s.row_count(table.name).await.unwrap(), 1);
  assert_eq!(
    s.description(Dimension::Jurisdiccion, &key, None).await.unwrap().as_deref(),
    Some("Economía")
  );
}

#[tokio::test]
async fn composite_keys_keep_siblings_apart() {
  let s = store().await;
  let table = current_table(Dimension::Programa);
  let records = [
    Record::new().with("servicio_id", "320").with("programa_id", "16").with("programa_desc", "A"),
    Record::new().with("servicio_id", "321").with("programa_id", "16").with("programa_desc", "B"),
  ];
  s.upsert(&table, &records).await.unwrap();

  assert_eq!(s.row_count(table.name).await.unwrap(), 2);
  let b = s.description(Dimension::Programa, &DimensionKey::from(["321", "16"]), None).await.unwrap();
  assert_eq!(b.as_deref(), Some("B"));
}

#[tokio::test]
async fn historical_descriptions_are_per_year() {
  let s = store().await;
  let table = historical_table(Dimension::Inciso);
  let records = [
    Record::new().with("inciso_id", "1").with("ejercicio_presupuestario", 2023_i64).with("inciso_desc", "Old"),
    Record::new().with("inciso_id", "1").with("ejercicio_presupuestario", 2024_i64).with("inciso_desc", "New"),
  ];
  s.upsert(&table, &records).await.unwrap();

  let key = DimensionKey::from(["1"]);
  assert_eq!(s.description(Dimension::Inciso, &key, Some(2023)).await.unwrap().as_deref(), Some("Old"));
  assert_eq!(s.description(Dimension::Inciso, &key, Some(2024)).await.unwrap().as_deref(), Some("New"));
  assert_eq!(s.description(Dimension::Inciso, &key, Some(2022)).await.unwrap(), None);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
  let s = store().await;
  s.upsert(&FACT_TABLE, &[]).await.unwrap();
  assert_eq!(s.row_count(FACT_TABLE.name).await.unwrap(), 0);
}

#[tokio::test]
async fn batch_without_conflict_column_is_rejected() {
  let s = store().await;
  let table = current_table(Dimension::Inciso);
  let err = s.upsert(&table, &[Record::new().with("inciso_desc", "x")]).await.unwrap_err();
  assert!(matches!(err, Error::MissingConflictColumn { ref column, .. } if column == "inciso_id"));
}

#[tokio::test]
async fn batch_with_mixed_layouts_is_rejected() {
  let s = store().await;
  let table = current_table(Dimension::Inciso);
  let records = [
    Record::new().with("inciso_id", "1").with("inciso_desc", "x"),
    Record::new().with("inciso_id", "2"),
  ];
  assert!(matches!(s.upsert(&table, &records).await.unwrap_err(), Error::MixedColumns(_)));
  assert_eq!(s.row_count(table.name).await.unwrap(), 0);
}

fn fact(month: i64, hash: &str) -> Record {
  let record = Record::new()
    .with("ejercicio_presupuestario", 2024_i64)
    .with("impacto_presupuestario_mes", month);
  Dimension::ALL
    .iter()
    .fold(record, |r, dim| r.with(dim.id_column(), "1"))
    .with("credito_devengado", Money::parse("1"))
    .with("credito_vigente", Money::ZERO)
    .with("source_file", "credito-mensual-2024")
    .with("row_hash", hash)
}

#[tokio::test]
async fn failed_batch_rolls_back() {
  let s = store().await;
  // Month 13 violates the CHECK constraint on the second record.
  let err = s.upsert(&FACT_TABLE, &[fact(1, "a"), fact(13, "b")]).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)));
  assert_eq!(s.row_count(FACT_TABLE.name).await.unwrap(), 0);

  s.upsert(&FACT_TABLE, &[fact(1, "a"), fact(2, "b")]).await.unwrap();
  assert_eq!(s.row_count(FACT_TABLE.name).await.unwrap(), 2);
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rerunning_a_range_is_idempotent() {
  let dir = TempDir::new().unwrap();
  write_year(dir.path(), 2023, &[row(1, "320", "Hacienda", "1.000,10"), row(2, "320", "Hacienda", "5")]);
  write_year(dir.path(), 2024, &[row(1, "320", "Economía", "0,00000001"), row(1, "320", "Economía", "7")]);

  let source = DirSource(dir.path().to_path_buf());
  let s = store().await;
  let range = YearRange::new(2023, 2024).unwrap();

  let report = Driver::new(&source, &s).batch_size(1).run(range).await.unwrap();
  assert!(report.is_success());
  let hashes_2023 = s.fact_hashes(2023).await.unwrap();
  let hashes_2024 = s.fact_hashes(2024).await.unwrap();
  assert_eq!((hashes_2023.len(), hashes_2024.len()), (2, 1));

  Driver::new(&source, &s).run(range).await.unwrap();
  assert_eq!(s.fact_hashes(2023).await.unwrap(), hashes_2023);
  assert_eq!(s.fact_hashes(2024).await.unwrap(), hashes_2024);
  assert_eq!(s.row_count(FACT_TABLE.name).await.unwrap(), 3);

  let key = DimensionKey::from(["20"]);
  assert_eq!(s.description(Dimension::Jurisdiccion, &key, None).await.unwrap().as_deref(), Some("Economía"));
  assert_eq!(
    s.description(Dimension::Jurisdiccion, &key, Some(2023)).await.unwrap().as_deref(),
    Some("Hacienda")
  );
  // Blank subprogram descriptions are not recorded.
  assert_eq!(s.row_count("dim_subprograma").await.unwrap(), 0);
}

#[tokio::test]
async fn amounts_survive_storage_exactly() {
  let dir = TempDir::new().unwrap();
  write_year(dir.path(), 2024, &[
    row(3, "320", "Min", "123456789012,12345678"),
    row(3, "320", "Min", "0,00000002"),
    row(4, "321", "Min", "1"),
  ]);

  let source = DirSource(dir.path().to_path_buf());
  let s = store().await;
  Driver::new(&source, &s).run_year(2024).await.unwrap();

  let (accrued, budget) = s.fact_totals(2024).await.unwrap();
  assert_eq!(accrued, Money::parse("123456789013.1234568"));
  assert_eq!(budget, Money::ZERO);
}

#[tokio::test]
async fn ipc_series_upserts_by_period() {
  let response: SeriesResponse = serde_json::from_str(
    r#"{"data": [["2024-01-01", 100.5], ["2024-02-01", "101,25"], ["2024-03-01", null]]}"#,
  )
  .unwrap();
  let s = store().await;
  let records = ipc_records(&response);
  s.upsert(&IPC_TABLE, &records).await.unwrap();
  s.upsert(&IPC_TABLE, &records).await.unwrap();
  assert_eq!(s.row_count(IPC_TABLE.name).await.unwrap(), 2);
}
