//! End-to-end pipeline: fetch-all, transform-all, deliver-all
//!
//! Each run is a pure function from (source, rules, sink) to a
//! [`RunSummary`]; there is no shared mutable state between runs. Only an
//! authentication rejection or total connectivity failure before the first
//! page is run-fatal — everything else degrades to counted, per-item
//! outcomes.

use crate::error::{Result, SyncError};
use crate::fetch::{PageSource, PagedFetcher};
use crate::model::{RunSummary, SourceRecord};
use crate::sink::{BatchUploader, Sink};
use crate::transform::{normalize, Enricher, MappingRules, Transformed};
use tracing::{debug, info, warn};

pub struct Pipeline {
    fetcher: PagedFetcher,
    uploader: BatchUploader,
}

impl Pipeline {
    pub fn new(fetcher: PagedFetcher, batch_size: usize) -> Self {
        Self {
            fetcher,
            uploader: BatchUploader::new(batch_size),
        }
    }

    /// Run one sync pass.
    ///
    /// Returns `Err` only for rejected credentials or a transport failure
    /// before the first page. Any other fetch failure degrades to a
    /// `fetch_error` recorded in the summary, and the pages already
    /// retrieved (possibly none) flow through transformation and delivery.
    pub async fn run(
        &self,
        source: &dyn PageSource,
        rules: &MappingRules,
        enricher: Option<&dyn Enricher>,
        sink: &dyn Sink,
    ) -> Result<RunSummary> {
        let outcome = self.fetcher.fetch_all(source).await;
        let fetch_error = outcome.error.as_ref().map(ToString::to_string);
        if outcome.pages.is_empty() {
            match outcome.error {
                Some(error @ (SyncError::Auth { .. } | SyncError::Http(_))) => return Err(error),
                Some(error) => {
                    warn!(error = %error, "fetch failed before the first page; reporting an empty run");
                }
                None => {}
            }
        }

        let mut summary = RunSummary {
            pages: outcome.pages.len(),
            fetch_error,
            ..RunSummary::default()
        };

        let records: Vec<SourceRecord> = outcome
            .pages
            .into_iter()
            .flat_map(|page| page.records)
            .collect();
        summary.fetched = records.len();
        info!(records = summary.fetched, pages = summary.pages, "fetch complete");

        let mut assets = Vec::with_capacity(records.len());
        for record in &records {
            match normalize(record, rules) {
                Transformed::Asset(asset) => assets.push(*asset),
                Transformed::Skipped { reason } => {
                    summary.skipped += 1;
                    debug!(reason = %reason, "record skipped");
                }
            }
        }
        summary.transformed = assets.len();

        if let Some(enricher) = enricher {
            for asset in &mut assets {
                if let Err(error) = enricher.enrich(asset).await {
                    summary.enrich_failures += 1;
                    warn!(asset_id = %asset.id, error = %error, "enrichment failed; asset delivered without it");
                }
            }
        }

        let outcomes = self.uploader.deliver_all(&assets, sink).await;
        for outcome in &outcomes {
            if outcome.success {
                summary.batches_succeeded += 1;
            } else {
                summary.batches_failed += 1;
            }
        }
        summary.outcomes = outcomes;

        info!(
            fetched = summary.fetched,
            transformed = summary.transformed,
            skipped = summary.skipped,
            batches_ok = summary.batches_succeeded,
            batches_failed = summary.batches_failed,
            "run complete"
        );
        Ok(summary)
    }
}
