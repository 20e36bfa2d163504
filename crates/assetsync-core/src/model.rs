//! Core data model: source records, pages, normalized assets and outcomes

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One record as returned by a source API: an opaque JSON object.
pub type SourceRecord = serde_json::Map<String, Value>;

/// Pagination position. Source APIs hand back either an opaque token or a
/// numeric offset; both travel through the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Token(String),
    Offset(u64),
}

/// One fetched page. An absent `next_cursor` terminates pagination.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<SourceRecord>,
    pub next_cursor: Option<Cursor>,
}

/// Canonical asset representation, independent of source vendor shape.
///
/// Field names serialize in the camelCase form the ingest destinations
/// expect (`macAddress`, `osVersion`, `customAttributes`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAsset {
    /// Stable identifier from the source system; never empty
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,

    /// Validated IPv4/IPv6 addresses, deduplicated, insertion order preserved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,

    /// Colon-delimited uppercase 6-octet MAC, when one normalized cleanly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// Flattened source attributes, underscore-joined key paths
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_attributes: BTreeMap<String, String>,
}

impl NormalizedAsset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Outcome of delivering one batch to a sink.
///
/// Failures are recorded here rather than raised, so one bad batch never
/// aborts the rest of the run.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub batch_index: usize,
    pub record_count: usize,
    /// Unix epoch seconds at which delivery was attempted
    pub attempted_at: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(batch_index: usize, record_count: usize, http_status: Option<u16>) -> Self {
        Self {
            batch_index,
            record_count,
            attempted_at: Utc::now().timestamp(),
            success: true,
            http_status,
            error: None,
        }
    }

    pub fn failed(
        batch_index: usize,
        record_count: usize,
        http_status: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            batch_index,
            record_count,
            attempted_at: Utc::now().timestamp(),
            success: false,
            http_status,
            error: Some(error.into()),
        }
    }
}

/// Aggregated result of one pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Pages retrieved from the source
    pub pages: usize,
    /// Source records fetched
    pub fetched: usize,
    /// Records normalized into assets
    pub transformed: usize,
    /// Records skipped (missing id or unusable shape)
    pub skipped: usize,
    /// Assets whose enrichment lookup failed (asset still delivered)
    pub enrich_failures: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    /// Error that cut fetching short, if any; fetched pages were still used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
    pub outcomes: Vec<DeliveryOutcome>,
}
