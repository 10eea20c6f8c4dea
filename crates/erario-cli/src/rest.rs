//! [`RestSink`]: upserts over a PostgREST endpoint (Supabase's `/rest/v1`).

use std::time::Duration;

use erario_core::{
  Sink,
  sink::{Record, TableSpec},
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::settings::RestCredentials;

#[derive(Debug, Error)]
pub enum RestError {
  #[error("request to {table} failed")]
  Http {
    table:  &'static str,
    #[source]
    source: reqwest::Error,
  },

  #[error("{table} upsert rejected with {status}: {body}")]
  Status {
    table:  &'static str,
    status: StatusCode,
    body:   String,
  },
}

/// Async PostgREST client. Cheap to clone: the inner [`reqwest::Client`] is
/// `Arc`-based.
#[derive(Clone)]
pub struct RestSink {
  client: Client,
  creds:  RestCredentials,
}

impl RestSink {
  pub fn new(creds: RestCredentials) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(120))
      .build()?;
    Ok(Self { client, creds })
  }

  /// `{url}/rest/v1/{table}`
  fn endpoint(&self, table: &str) -> String {
    format!("{}/rest/v1/{table}", self.creds.url.trim_end_matches('/'))
  }
}

impl Sink for RestSink {
  type Error = RestError;

  /// `POST /rest/v1/{table}?on_conflict=…` with merge-duplicates resolution.
  async fn upsert(&self, table: &TableSpec, records: &[Record]) -> Result<(), RestError> {
    if records.is_empty() {
      return Ok(());
    }

    let resp = self
      .client
      .post(self.endpoint(table.name))
      .query(&[("on_conflict", table.conflict.join(","))])
      .header("apikey", &self.creds.key)
      .bearer_auth(&self.creds.key)
      .header("Prefer", "resolution=merge-duplicates,return=minimal")
      .json(records)
      .send()
      .await
      .map_err(|source| RestError::Http { table: table.name, source })?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(RestError::Status { table: table.name, status, body });
    }

    debug!(table = table.name, rows = records.len(), "rest batch accepted");
    Ok(())
  }
}
