//! Batch delivery to destination sinks
//!
//! [`BatchUploader`] partitions normalized assets into contiguous batches and
//! hands each to a [`Sink`]. A failed batch is recorded in its outcome and
//! the run moves on to the next batch; one bad batch never aborts the run.

use crate::error::{Result, SyncError};
use crate::fetch::AuthContext;
use crate::model::{DeliveryOutcome, NormalizedAsset};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Default batch size, matching the bulk ingest endpoints' sweet spot
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Destination for batches of normalized assets.
///
/// `deliver` never returns an error: failures are encoded in the outcome so
/// the uploader can continue with the remaining batches.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, batch_index: usize, assets: &[NormalizedAsset]) -> DeliveryOutcome;
}

/// Partitions assets into fixed-size batches and delivers them in order.
pub struct BatchUploader {
    batch_size: usize,
}

impl BatchUploader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Deliver every batch, continuing past failures.
    pub async fn deliver_all(
        &self,
        assets: &[NormalizedAsset],
        sink: &dyn Sink,
    ) -> Vec<DeliveryOutcome> {
        if assets.is_empty() {
            info!("no assets to deliver");
            return Vec::new();
        }

        let mut outcomes = Vec::new();
        for (batch_index, batch) in assets.chunks(self.batch_size).enumerate() {
            let outcome = sink.deliver(batch_index, batch).await;
            if outcome.success {
                info!(batch = batch_index, records = batch.len(), "batch delivered");
            } else {
                warn!(
                    batch = batch_index,
                    records = batch.len(),
                    status = ?outcome.http_status,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "batch delivery failed; continuing with remaining batches"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Body encoding for [`HttpSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// One JSON object per line
    #[default]
    Ndjson,
    /// A single JSON array body
    JsonArray,
}

/// Bulk HTTP ingest sink: POSTs each batch to a configured endpoint.
pub struct HttpSink {
    client: Client,
    endpoint: String,
    auth: AuthContext,
    format: PayloadFormat,
}

impl HttpSink {
    pub fn new(client: Client, endpoint: impl Into<String>, auth: AuthContext) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            auth,
            format: PayloadFormat::default(),
        }
    }

    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    async fn post_batch(&self, assets: &[NormalizedAsset]) -> Result<(u16, Option<String>)> {
        let request = match self.format {
            PayloadFormat::Ndjson => {
                let mut lines = Vec::with_capacity(assets.len());
                for asset in assets {
                    lines.push(serde_json::to_string(asset)?);
                }
                self.client
                    .post(&self.endpoint)
                    .header(CONTENT_TYPE, "application/x-ndjson")
                    .body(lines.join("\n"))
            }
            PayloadFormat::JsonArray => self.client.post(&self.endpoint).json(assets),
        };

        let response = self.auth.apply(request).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok((status.as_u16(), None))
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok((status.as_u16(), Some(body)))
        }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn deliver(&self, batch_index: usize, assets: &[NormalizedAsset]) -> DeliveryOutcome {
        match self.post_batch(assets).await {
            Ok((status, None)) => DeliveryOutcome::delivered(batch_index, assets.len(), Some(status)),
            Ok((status, Some(body))) => {
                DeliveryOutcome::failed(batch_index, assets.len(), Some(status), body)
            }
            Err(error) => DeliveryOutcome::failed(batch_index, assets.len(), None, error.to_string()),
        }
    }
}

/// On-disk output format for [`FileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Ndjson,
    Csv,
}

const CSV_HEADER: [&str; 9] = [
    "id",
    "hostnames",
    "addresses",
    "mac_address",
    "os",
    "os_version",
    "manufacturer",
    "model",
    "custom_attributes",
];

/// File sink: truncate-then-write per run. The first successful open
/// truncates the file (and writes the CSV header); later batches append.
/// Tying the reset to the open rather than the batch index means a failed
/// first batch cannot leave stale content from an earlier run in place.
pub struct FileSink {
    path: PathBuf,
    format: FileFormat,
    reset_done: AtomicBool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
            reset_done: AtomicBool::new(false),
        }
    }

    fn write_batch(&self, assets: &[NormalizedAsset]) -> Result<()> {
        let fresh = !self.reset_done.load(Ordering::SeqCst);
        let mut options = OpenOptions::new();
        if fresh {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let file = options.open(&self.path)?;
        self.reset_done.store(true, Ordering::SeqCst);

        match self.format {
            FileFormat::Ndjson => {
                let mut writer = BufWriter::new(file);
                for asset in assets {
                    serde_json::to_writer(&mut writer, asset)?;
                    writeln!(writer)?;
                }
                writer.flush()?;
            }
            FileFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                if fresh {
                    writer.write_record(CSV_HEADER)?;
                }
                for asset in assets {
                    let hostnames = asset.hostnames.join(";");
                    let addresses = asset.addresses.join(";");
                    let attributes = serde_json::to_string(&asset.custom_attributes)?;
                    writer.write_record([
                        asset.id.as_str(),
                        hostnames.as_str(),
                        addresses.as_str(),
                        asset.mac_address.as_deref().unwrap_or(""),
                        asset.os.as_str(),
                        asset.os_version.as_str(),
                        asset.manufacturer.as_str(),
                        asset.model.as_str(),
                        attributes.as_str(),
                    ])?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn deliver(&self, batch_index: usize, assets: &[NormalizedAsset]) -> DeliveryOutcome {
        match self.write_batch(assets) {
            Ok(()) => DeliveryOutcome::delivered(batch_index, assets.len(), None),
            Err(error) => DeliveryOutcome::failed(batch_index, assets.len(), None, error.to_string()),
        }
    }
}

/// Upsert sink: per-record match-or-create against a second REST API.
///
/// Each record first runs a match lookup; a hit issues an update against the
/// matched entity, a miss issues a create. Record-level failures are
/// aggregated into the batch outcome.
pub struct UpsertSink {
    client: Client,
    auth: AuthContext,
    /// Match/lookup endpoint; receives the identifying fields
    match_url: String,
    /// Create endpoint for unmatched records
    create_url: String,
    /// Update endpoint template containing an `{id}` placeholder
    update_url: String,
}

impl UpsertSink {
    pub fn new(
        client: Client,
        auth: AuthContext,
        match_url: impl Into<String>,
        create_url: impl Into<String>,
        update_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth,
            match_url: match_url.into(),
            create_url: create_url.into(),
            update_url: update_url.into(),
        }
    }

    /// Look up an existing entity by name and address; `None` means no match.
    async fn match_entity(&self, asset: &NormalizedAsset) -> Result<Option<String>> {
        let body = json!({
            "name": asset.hostnames,
            "address": asset.addresses.first(),
        });
        let request = self.client.post(&self.match_url).json(&body);
        let response = self.auth.apply(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::fetch(status.as_u16(), body));
        }

        let matches: Value = response.json().await?;
        let matched = matches
            .pointer("/0/id")
            .or_else(|| matches.pointer("/matches/0/id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(matched)
    }

    async fn upsert(&self, asset: &NormalizedAsset) -> Result<()> {
        let request = match self.match_entity(asset).await? {
            Some(entity_id) => {
                let url = self.update_url.replace("{id}", &entity_id);
                self.client.post(url).json(asset)
            }
            None => self.client.post(&self.create_url).json(asset),
        };

        let response = self.auth.apply(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::fetch(status.as_u16(), body));
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for UpsertSink {
    async fn deliver(&self, batch_index: usize, assets: &[NormalizedAsset]) -> DeliveryOutcome {
        let mut failed = 0usize;
        let mut last_status = None;
        let mut last_error = None;

        for asset in assets {
            if let Err(error) = self.upsert(asset).await {
                failed += 1;
                if let SyncError::Fetch { status, .. } = &error {
                    last_status = Some(*status);
                }
                warn!(asset_id = %asset.id, error = %error, "upsert failed; continuing");
                last_error = Some(error.to_string());
            }
        }

        if failed == 0 {
            DeliveryOutcome::delivered(batch_index, assets.len(), last_status)
        } else {
            DeliveryOutcome::failed(
                batch_index,
                assets.len(),
                last_status,
                format!(
                    "{failed} of {} records failed to upsert; last error: {}",
                    assets.len(),
                    last_error.unwrap_or_default()
                ),
            )
        }
    }
}
