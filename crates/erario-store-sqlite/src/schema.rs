//! SQL schema for the Erario SQLite store.
//!
//! A star schema: nine current dimensions, nine per-year historical
//! dimensions, one monthly fact table and the CPI series. Every table's
//! primary key is the conflict key its upserts use. There are no foreign
//! keys: facts may be loaded before the dimensions they reference.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Current snapshot: latest description per natural key.
CREATE TABLE IF NOT EXISTS dim_jurisdiccion (
    jurisdiccion_id   TEXT NOT NULL,
    jurisdiccion_desc TEXT NOT NULL,
    PRIMARY KEY (jurisdiccion_id)
);

CREATE TABLE IF NOT EXISTS dim_servicio (
    servicio_id   TEXT NOT NULL,
    servicio_desc TEXT NOT NULL,
    PRIMARY KEY (servicio_id)
);

CREATE TABLE IF NOT EXISTS dim_programa (
    servicio_id   TEXT NOT NULL,
    programa_id   TEXT NOT NULL,
    programa_desc TEXT NOT NULL,
    PRIMARY KEY (servicio_id, programa_id)
);

CREATE TABLE IF NOT EXISTS dim_subprograma (
    servicio_id      TEXT NOT NULL,
    programa_id      TEXT NOT NULL,
    subprograma_id   TEXT NOT NULL,
    subprograma_desc TEXT NOT NULL,
    PRIMARY KEY (servicio_id, programa_id, subprograma_id)
);

CREATE TABLE IF NOT EXISTS dim_inciso (
    inciso_id   TEXT NOT NULL,
    inciso_desc TEXT NOT NULL,
    PRIMARY KEY (inciso_id)
);

CREATE TABLE IF NOT EXISTS dim_ubicacion_geografica (
    ubicacion_geografica_id   TEXT NOT NULL,
    ubicacion_geografica_desc TEXT NOT NULL,
    PRIMARY KEY (ubicacion_geografica_id)
);

CREATE TABLE IF NOT EXISTS dim_finalidad (
    finalidad_id   TEXT NOT NULL,
    finalidad_desc TEXT NOT NULL,
    PRIMARY KEY (finalidad_id)
);

CREATE TABLE IF NOT EXISTS dim_funcion (
    finalidad_id TEXT NOT NULL,
    funcion_id   TEXT NOT NULL,
    funcion_desc TEXT NOT NULL,
    PRIMARY KEY (finalidad_id, funcion_id)
);

CREATE TABLE IF NOT EXISTS dim_fuente_financiamiento (
    fuente_financiamiento_id   TEXT NOT NULL,
    fuente_financiamiento_desc TEXT NOT NULL,
    PRIMARY KEY (fuente_financiamiento_id)
);

-- Historical snapshot: description as of each fiscal year.
CREATE TABLE IF NOT EXISTS dim_jurisdiccion_hist (
    jurisdiccion_id          TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    jurisdiccion_desc        TEXT    NOT NULL,
    PRIMARY KEY (jurisdiccion_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_servicio_hist (
    servicio_id              TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    servicio_desc            TEXT    NOT NULL,
    PRIMARY KEY (servicio_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_programa_hist (
    servicio_id              TEXT    NOT NULL,
    programa_id              TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    programa_desc            TEXT    NOT NULL,
    PRIMARY KEY (servicio_id, programa_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_subprograma_hist (
    servicio_id              TEXT    NOT NULL,
    programa_id              TEXT    NOT NULL,
    subprograma_id           TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    subprograma_desc         TEXT    NOT NULL,
    PRIMARY KEY (servicio_id, programa_id, subprograma_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_inciso_hist (
    inciso_id                TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    inciso_desc              TEXT    NOT NULL,
    PRIMARY KEY (inciso_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_ubicacion_geografica_hist (
    ubicacion_geografica_id   TEXT    NOT NULL,
    ejercicio_presupuestario  INTEGER NOT NULL,
    ubicacion_geografica_desc TEXT    NOT NULL,
    PRIMARY KEY (ubicacion_geografica_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_finalidad_hist (
    finalidad_id             TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    finalidad_desc           TEXT    NOT NULL,
    PRIMARY KEY (finalidad_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_funcion_hist (
    finalidad_id             TEXT    NOT NULL,
    funcion_id               TEXT    NOT NULL,
    ejercicio_presupuestario INTEGER NOT NULL,
    funcion_desc             TEXT    NOT NULL,
    PRIMARY KEY (finalidad_id, funcion_id, ejercicio_presupuestario)
);

CREATE TABLE IF NOT EXISTS dim_fuente_financiamiento_hist (
    fuente_financiamiento_id   TEXT    NOT NULL,
    ejercicio_presupuestario   INTEGER NOT NULL,
    fuente_financiamiento_desc TEXT    NOT NULL,
    PRIMARY KEY (fuente_financiamiento_id, ejercicio_presupuestario)
);

-- Amounts are canonical decimal strings; REAL would lose precision.
CREATE TABLE IF NOT EXISTS fact_credito_devengado_mensual (
    ejercicio_presupuestario   INTEGER NOT NULL,
    impacto_presupuestario_mes INTEGER NOT NULL CHECK (impacto_presupuestario_mes BETWEEN 1 AND 12),
    jurisdiccion_id            TEXT    NOT NULL,
    servicio_id                TEXT    NOT NULL,
    programa_id                TEXT    NOT NULL,
    subprograma_id             TEXT    NOT NULL,
    inciso_id                  TEXT    NOT NULL,
    ubicacion_geografica_id    TEXT    NOT NULL,
    finalidad_id               TEXT    NOT NULL,
    funcion_id                 TEXT    NOT NULL,
    fuente_financiamiento_id   TEXT    NOT NULL,
    credito_devengado          TEXT    NOT NULL,
    credito_vigente            TEXT    NOT NULL,
    source_file                TEXT    NOT NULL,
    row_hash                   TEXT    NOT NULL,
    PRIMARY KEY (ejercicio_presupuestario, row_hash)
);

CREATE INDEX IF NOT EXISTS fact_mes_idx          ON fact_credito_devengado_mensual(ejercicio_presupuestario, impacto_presupuestario_mes);
CREATE INDEX IF NOT EXISTS fact_jurisdiccion_idx ON fact_credito_devengado_mensual(jurisdiccion_id);

CREATE TABLE IF NOT EXISTS ipc_indice_mensual (
    periodo    TEXT NOT NULL,
    ipc_indice TEXT NOT NULL,
    fuente     TEXT NOT NULL,
    base       TEXT NOT NULL,
    PRIMARY KEY (periodo)
);

PRAGMA user_version = 1;
";
