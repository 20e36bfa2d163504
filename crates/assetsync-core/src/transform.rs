//! Normalization of source records into canonical assets
//!
//! Field access is driven by declarative [`MappingRules`] rather than
//! per-source code: adding a vendor is a rule-set change. Malformed values
//! (bad IPs, garbled MACs, unparseable timestamps) are dropped, never fatal;
//! a record without a usable id is skipped and counted.

use crate::error::{Result, SyncError};
use crate::fetch::AuthContext;
use crate::flatten::flatten_value;
use crate::model::{NormalizedAsset, SourceRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use tracing::warn;

/// Declarative, per-source field mapping consumed by [`normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRules {
    /// Source field holding the stable asset identifier; records without it are skipped
    pub id_field: String,

    #[serde(default)]
    pub hostname_fields: Vec<String>,

    #[serde(default)]
    pub address_fields: Vec<String>,

    #[serde(default)]
    pub mac_field: Option<String>,

    #[serde(default)]
    pub os_field: Option<String>,

    #[serde(default)]
    pub os_version_field: Option<String>,

    #[serde(default)]
    pub manufacturer_field: Option<String>,

    #[serde(default)]
    pub model_field: Option<String>,

    /// Top-level ISO-8601 fields converted to epoch seconds in the attribute map
    #[serde(default)]
    pub timestamp_fields: Vec<String>,

    /// Flattened-key prefixes excluded from the attribute map
    #[serde(default)]
    pub exclude_prefixes: Vec<String>,
}

impl MappingRules {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            hostname_fields: Vec::new(),
            address_fields: Vec::new(),
            mac_field: None,
            os_field: None,
            os_version_field: None,
            manufacturer_field: None,
            model_field: None,
            timestamp_fields: Vec::new(),
            exclude_prefixes: Vec::new(),
        }
    }

    /// Top-level source fields consumed by named asset fields; their
    /// flattened descendants are dropped from the attribute map to avoid
    /// duplication.
    fn consumed_fields(&self) -> HashSet<&str> {
        let mut consumed: HashSet<&str> = HashSet::new();
        consumed.insert(self.id_field.as_str());
        consumed.extend(self.hostname_fields.iter().map(String::as_str));
        consumed.extend(self.address_fields.iter().map(String::as_str));
        for field in [
            &self.mac_field,
            &self.os_field,
            &self.os_version_field,
            &self.manufacturer_field,
            &self.model_field,
        ]
        .into_iter()
        .flatten()
        {
            consumed.insert(field.as_str());
        }
        consumed
    }
}

/// Result of normalizing one record. `Skipped` is an expected outcome, not an
/// error: the run continues and the skip is counted.
#[derive(Debug)]
pub enum Transformed {
    Asset(Box<NormalizedAsset>),
    Skipped { reason: String },
}

/// Normalize one source record according to the mapping rules.
pub fn normalize(record: &SourceRecord, rules: &MappingRules) -> Transformed {
    let Some(id) = record.get(&rules.id_field).and_then(scalar_string) else {
        return Transformed::Skipped {
            reason: format!("missing id field `{}`", rules.id_field),
        };
    };

    let mut asset = NormalizedAsset::new(id);

    for field in &rules.hostname_fields {
        for hostname in record.get(field).map(string_list).unwrap_or_default() {
            asset.hostnames.push(hostname);
        }
    }

    let mut seen = HashSet::new();
    for field in &rules.address_fields {
        for candidate in record.get(field).map(string_list).unwrap_or_default() {
            // invalid entries are dropped silently
            if let Ok(addr) = candidate.parse::<IpAddr>() {
                let canonical = addr.to_string();
                if seen.insert(canonical.clone()) {
                    asset.addresses.push(canonical);
                }
            }
        }
    }

    if let Some(field) = &rules.mac_field {
        asset.mac_address = record
            .get(field)
            .map(string_list)
            .unwrap_or_default()
            .iter()
            .find_map(|candidate| normalize_mac(candidate));
    }

    asset.os = field_string(record, &rules.os_field);
    asset.os_version = field_string(record, &rules.os_version_field);
    asset.manufacturer = field_string(record, &rules.manufacturer_field);
    asset.model = field_string(record, &rules.model_field);

    // flatten everything except the top-level fields already consumed by
    // named asset fields
    let consumed = rules.consumed_fields();
    let mut attributes = BTreeMap::new();
    for (key, value) in record {
        if consumed.contains(key.as_str()) {
            continue;
        }
        attributes.extend(flatten_value(value, key));
    }
    attributes.retain(|key, _| {
        !rules
            .exclude_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    });

    for field in &rules.timestamp_fields {
        if let Some(raw) = attributes.get(field).cloned() {
            match parse_epoch_seconds(&raw) {
                Some(epoch) => {
                    attributes.insert(field.clone(), epoch.to_string());
                }
                None => {
                    warn!(field = %field, value = %raw, "unparseable timestamp dropped");
                    attributes.remove(field);
                }
            }
        }
    }

    asset.custom_attributes = attributes;
    Transformed::Asset(Box::new(asset))
}

/// Normalize a MAC candidate to uppercase colon-delimited form.
///
/// Anything that does not reduce to exactly 12 hex digits after stripping
/// separators is treated as absent.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() != 12 {
        return None;
    }
    let upper = hex.to_ascii_uppercase();
    let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
    Some(octets.join(":"))
}

/// Parse an ISO-8601 timestamp to Unix epoch seconds. A value without an
/// offset is taken as UTC.
pub fn parse_epoch_seconds(raw: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp());
    }
    None
}

fn field_string(record: &SourceRecord, field: &Option<String>) -> String {
    field
        .as_ref()
        .and_then(|name| record.get(name))
        .and_then(scalar_string)
        .unwrap_or_default()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A scalar becomes a one-element list; an array contributes each scalar
/// element. Other shapes contribute nothing.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

/// Per-asset secondary lookup merged into the normalized asset.
///
/// A failed lookup for one asset must not abort the rest of the run; callers
/// isolate each invocation and count failures.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, asset: &mut NormalizedAsset) -> Result<()>;
}

/// HTTP enricher that fetches per-asset detail (software, vulnerabilities)
/// from a URL templated on the asset id and merges the flattened response
/// into the attribute map.
pub struct HttpDetailEnricher {
    client: Client,
    /// URL template containing an `{id}` placeholder
    detail_url: String,
    auth: AuthContext,
    attribute_prefix: String,
}

impl HttpDetailEnricher {
    pub fn new(
        client: Client,
        detail_url: impl Into<String>,
        auth: AuthContext,
        attribute_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            detail_url: detail_url.into(),
            auth,
            attribute_prefix: attribute_prefix.into(),
        }
    }
}

#[async_trait]
impl Enricher for HttpDetailEnricher {
    async fn enrich(&self, asset: &mut NormalizedAsset) -> Result<()> {
        let url = self.detail_url.replace("{id}", &asset.id);
        let response = self.auth.apply(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::fetch(status.as_u16(), body));
        }

        let detail: Value = response.json().await?;
        asset
            .custom_attributes
            .extend(flatten_value(&detail, &self.attribute_prefix));
        Ok(())
    }
}
