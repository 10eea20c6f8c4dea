//! Classification dimensions of the budget fact table.
//!
//! Programs, sub-programs and functions are hierarchically scoped: a program
//! identifier is only unique under its service, a sub-program under its
//! service and program, a function under its purpose. Dimension keys always
//! carry the full ancestor chain.

use std::collections::HashMap;

// ─── Dimension kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
  Jurisdiccion,
  Servicio,
  Programa,
  Subprograma,
  Inciso,
  UbicacionGeografica,
  Finalidad,
  Funcion,
  FuenteFinanciamiento,
}

impl Dimension {
  /// All kinds, in fact-grain order.
  pub const ALL: [Self; 9] = [
    Self::Jurisdiccion,
    Self::Servicio,
    Self::Programa,
    Self::Subprograma,
    Self::Inciso,
    Self::UbicacionGeografica,
    Self::Finalidad,
    Self::Funcion,
    Self::FuenteFinanciamiento,
  ];

  pub const fn index(self) -> usize { self as usize }

  /// Normalized source column holding the identifier.
  pub const fn id_column(self) -> &'static str {
    match self {
      Self::Jurisdiccion => "jurisdiccion_id",
      Self::Servicio => "servicio_id",
      Self::Programa => "programa_id",
      Self::Subprograma => "subprograma_id",
      Self::Inciso => "inciso_id",
      Self::UbicacionGeografica => "ubicacion_geografica_id",
      Self::Finalidad => "finalidad_id",
      Self::Funcion => "funcion_id",
      Self::FuenteFinanciamiento => "fuente_financiamiento_id",
    }
  }

  /// Normalized source column holding the description.
  pub const fn desc_column(self) -> &'static str {
    match self {
      Self::Jurisdiccion => "jurisdiccion_desc",
      Self::Servicio => "servicio_desc",
      Self::Programa => "programa_desc",
      Self::Subprograma => "subprograma_desc",
      Self::Inciso => "inciso_desc",
      Self::UbicacionGeografica => "ubicacion_geografica_desc",
      Self::Finalidad => "finalidad_desc",
      Self::Funcion => "funcion_desc",
      Self::FuenteFinanciamiento => "fuente_financiamiento_desc",
    }
  }

  /// The dimensions whose identifiers form this one's natural key, ancestors
  /// first and the leaf last.
  pub const fn scope(self) -> &'static [Dimension] {
    match self {
      Self::Programa => &[Self::Servicio, Self::Programa],
      Self::Subprograma => &[Self::Servicio, Self::Programa, Self::Subprograma],
      Self::Funcion => &[Self::Finalidad, Self::Funcion],
      Self::Jurisdiccion => &[Self::Jurisdiccion],
      Self::Servicio => &[Self::Servicio],
      Self::Inciso => &[Self::Inciso],
      Self::UbicacionGeografica => &[Self::UbicacionGeografica],
      Self::Finalidad => &[Self::Finalidad],
      Self::FuenteFinanciamiento => &[Self::FuenteFinanciamiento],
    }
  }

  /// Sink table for the current snapshot.
  pub const fn table(self) -> &'static str {
    match self {
      Self::Jurisdiccion => "dim_jurisdiccion",
      Self::Servicio => "dim_servicio",
      Self::Programa => "dim_programa",
      Self::Subprograma => "dim_subprograma",
      Self::Inciso => "dim_inciso",
      Self::UbicacionGeografica => "dim_ubicacion_geografica",
      Self::Finalidad => "dim_finalidad",
      Self::Funcion => "dim_funcion",
      Self::FuenteFinanciamiento => "dim_fuente_financiamiento",
    }
  }

  /// Sink table for the per-year historical snapshot.
  pub const fn hist_table(self) -> &'static str {
    match self {
      Self::Jurisdiccion => "dim_jurisdiccion_hist",
      Self::Servicio => "dim_servicio_hist",
      Self::Programa => "dim_programa_hist",
      Self::Subprograma => "dim_subprograma_hist",
      Self::Inciso => "dim_inciso_hist",
      Self::UbicacionGeografica => "dim_ubicacion_geografica_hist",
      Self::Finalidad => "dim_finalidad_hist",
      Self::Funcion => "dim_funcion_hist",
      Self::FuenteFinanciamiento => "dim_fuente_financiamiento_hist",
    }
  }

  /// Conflict columns of [`Dimension::table`].
  pub const fn key_columns(self) -> &'static [&'static str] {
    match self {
      Self::Jurisdiccion => &["jurisdiccion_id"],
      Self::Servicio => &["servicio_id"],
      Self::Programa => &["servicio_id", "programa_id"],
      Self::Subprograma => &["servicio_id", "programa_id", "subprograma_id"],
      Self::Inciso => &["inciso_id"],
      Self::UbicacionGeografica => &["ubicacion_geografica_id"],
      Self::Finalidad => &["finalidad_id"],
      Self::Funcion => &["finalidad_id", "funcion_id"],
      Self::FuenteFinanciamiento => &["fuente_financiamiento_id"],
    }
  }

  /// Conflict columns of [`Dimension::hist_table`].
  pub const fn hist_key_columns(self) -> &'static [&'static str] {
    match self {
      Self::Jurisdiccion => &["jurisdiccion_id", YEAR_COLUMN],
      Self::Servicio => &["servicio_id", YEAR_COLUMN],
      Self::Programa => &["servicio_id", "programa_id", YEAR_COLUMN],
      Self::Subprograma => &["servicio_id", "programa_id", "subprograma_id", YEAR_COLUMN],
      Self::Inciso => &["inciso_id", YEAR_COLUMN],
      Self::UbicacionGeografica => &["ubicacion_geografica_id", YEAR_COLUMN],
      Self::Finalidad => &["finalidad_id", YEAR_COLUMN],
      Self::Funcion => &["finalidad_id", "funcion_id", YEAR_COLUMN],
      Self::FuenteFinanciamiento => &["fuente_financiamiento_id", YEAR_COLUMN],
    }
  }
}

/// Fiscal-year column shared by historical dimensions and facts.
pub const YEAR_COLUMN: &str = "ejercicio_presupuestario";

/// Identifier used when a row leaves a dimension blank ("unclassified").
pub const UNCLASSIFIED: &str = "0";

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// The nine dimension identifiers of one row, indexed by [`Dimension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionIds([String; 9]);

impl DimensionIds {
  pub fn new(ids: [String; 9]) -> Self { Self(ids) }

  pub fn get(&self, dim: Dimension) -> &str { &self.0[dim.index()] }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

  /// Natural key of `dim` for this row.
  pub fn key(&self, dim: Dimension) -> DimensionKey {
    DimensionKey(dim.scope().iter().map(|d| self.get(*d).to_owned()).collect())
  }
}

/// A dimension's natural key: the leaf identifier plus all ancestors, in
/// [`Dimension::scope`] order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionKey(Vec<String>);

impl DimensionKey {
  pub fn parts(&self) -> &[String] { &self.0 }
}

impl<const N: usize> From<[&str; N]> for DimensionKey {
  fn from(parts: [&str; N]) -> Self { Self(parts.iter().map(|p| (*p).to_owned()).collect()) }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// Natural key → latest description seen.
pub type DimensionMap = HashMap<DimensionKey, String>;

/// One [`DimensionMap`] per dimension kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionMaps([DimensionMap; 9]);

impl DimensionMaps {
  pub fn get(&self, dim: Dimension) -> &DimensionMap { &self.0[dim.index()] }

  /// Last writer wins.
  pub fn upsert(&mut self, dim: Dimension, key: DimensionKey, desc: &str) {
    let map = &mut self.0[dim.index()];
    match map.get_mut(&key) {
      Some(existing) if existing == desc => {}
      Some(existing) => desc.clone_into(existing),
      None => {
        map.insert(key, desc.to_owned());
      }
    }
  }

  pub fn len(&self) -> usize { self.0.iter().map(HashMap::len).sum() }

  pub fn is_empty(&self) -> bool { self.0.iter().all(HashMap::is_empty) }

  pub fn clear(&mut self) { self.0.iter_mut().for_each(HashMap::clear); }
}
