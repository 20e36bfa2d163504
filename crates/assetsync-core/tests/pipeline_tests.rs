//! Integration tests for the fetch → transform → deliver pipeline
//!
//! A wiremock server stands in for both the source inventory API and the
//! destination sinks, covering: pagination termination, partial-result
//! fetch failures, auth-failure fatality, batch failure isolation, upsert
//! match-vs-create, and per-asset enrichment isolation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assetsync_core::fetch::{AuthContext, CursorPager, OffsetPager, PagedFetcher, RetryPolicy};
use assetsync_core::model::{DeliveryOutcome, NormalizedAsset};
use assetsync_core::pipeline::Pipeline;
use assetsync_core::sink::{BatchUploader, HttpSink, Sink, UpsertSink};
use assetsync_core::transform::{Enricher, MappingRules};
use assetsync_core::{Result, SyncError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> PagedFetcher {
    PagedFetcher::new(Duration::from_secs(5)).unwrap()
}

fn asset_records(start: usize, count: usize) -> Value {
    let records: Vec<Value> = (start..start + count)
        .map(|i| {
            json!({
                "id": format!("asset-{i:04}"),
                "names": [format!("host-{i:04}")],
                "addresses": ["10.0.0.5"],
            })
        })
        .collect();
    Value::Array(records)
}

fn inventory_rules() -> MappingRules {
    let mut rules = MappingRules::new("id");
    rules.hostname_fields = vec!["names".to_string()];
    rules.address_fields = vec!["addresses".to_string()];
    rules
}

async fn mount_offset_page(server: &MockServer, offset: usize, body: Value) {
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_offset_pagination_returns_all_pages() {
    let server = MockServer::start().await;
    // 12 records in pages of 5: 5, 5, 2
    mount_offset_page(&server, 0, asset_records(0, 5)).await;
    mount_offset_page(&server, 5, asset_records(5, 5)).await;
    mount_offset_page(&server, 10, asset_records(10, 2)).await;

    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 5);
    let outcome = fetcher().fetch_all(&source).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.pages.len(), 3);
    assert_eq!(outcome.record_count(), 12);
}

#[tokio::test]
async fn test_offset_pagination_terminates_on_empty_page() {
    let server = MockServer::start().await;
    // exact multiple of the page size: the final probe comes back empty
    mount_offset_page(&server, 0, asset_records(0, 5)).await;
    mount_offset_page(&server, 5, asset_records(5, 5)).await;
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 5);
    let outcome = fetcher().fetch_all(&source).await;

    assert_eq!(outcome.pages.len(), 2);
    assert_eq!(outcome.record_count(), 10);
}

#[tokio::test]
async fn test_cursor_pagination_follows_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(query_param("nextPage", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": asset_records(3, 2),
            "metadata": {"pagination": {}}
        })))
        .mount(&server)
        .await;
    // first page carries the token; matched with lower priority so the
    // token-specific mock above wins when the parameter is present
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": asset_records(0, 3),
            "metadata": {"pagination": {"nextPage": "tok-2"}}
        })))
        .with_priority(10)
        .mount(&server)
        .await;

    let source = CursorPager::new(
        format!("{}/devices", server.uri()),
        AuthContext::None,
        "nextPage",
        "/metadata/pagination/nextPage",
    )
    .with_records_pointer("/data");

    let outcome = fetcher().fetch_all(&source).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.pages.len(), 2);
    assert_eq!(outcome.record_count(), 5);
}

#[tokio::test]
async fn test_echoed_cursor_does_not_loop() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": asset_records(0, 2),
            "next": "tok-1"
        })))
        .mount(&server)
        .await;

    let source = CursorPager::new(
        format!("{}/devices", server.uri()),
        AuthContext::None,
        "cursor",
        "/next",
    )
    .with_records_pointer("/data");

    // the source echoes tok-1 forever; the fetcher must stop on its own
    let outcome = fetcher().fetch_all(&source).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.pages.len(), 2);
}

#[tokio::test]
async fn test_failed_page_preserves_earlier_pages() {
    let server = MockServer::start().await;
    mount_offset_page(&server, 0, asset_records(0, 5)).await;
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .and(query_param("offset", "5"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 5);
    let outcome = fetcher().fetch_all(&source).await;

    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(outcome.record_count(), 5);
    match outcome.error {
        Some(SyncError::Fetch { status, ref body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_failure_is_run_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let sink_server = MockServer::start().await;
    let source = OffsetPager::new(
        format!("{}/org/assets", server.uri()),
        AuthContext::Bearer("bad-token".to_string()),
        100,
    );
    let fetcher = fetcher();
    let sink = HttpSink::new(
        fetcher.client().clone(),
        format!("{}/ingest", sink_server.uri()),
        AuthContext::None,
    );
    let pipeline = Pipeline::new(fetcher, 500);

    let result = pipeline.run(&source, &inventory_rules(), None, &sink).await;
    match result {
        Err(SyncError::Auth { status }) => assert_eq!(status, 401),
        other => panic!("expected auth failure, got {other:?}"),
    }
    // nothing was delivered
    assert!(sink_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_page_server_error_reports_empty_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let sink_server = MockServer::start().await;
    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 5);
    let fetcher = fetcher();
    let sink = HttpSink::new(
        fetcher.client().clone(),
        format!("{}/ingest", sink_server.uri()),
        AuthContext::None,
    );
    let pipeline = Pipeline::new(fetcher, 500);

    // a server-side failure before the first page is not run-fatal; the run
    // reports an empty summary carrying the fetch error
    let summary = pipeline
        .run(&source, &inventory_rules(), None, &sink)
        .await
        .unwrap();
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.pages, 0);
    assert!(summary.fetch_error.as_deref().unwrap_or("").contains("500"));
    assert!(summary.outcomes.is_empty());
    assert!(sink_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_policy_recovers_from_transient_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/assets"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_offset_page(&server, 0, asset_records(0, 3)).await;

    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 5);
    let fetcher = fetcher().with_retry(RetryPolicy::fixed(3, Duration::from_millis(10)));

    let outcome = fetcher.fetch_all(&source).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.record_count(), 3);
}

struct FailsBatch {
    fail_index: usize,
    delivered: AtomicUsize,
}

#[async_trait]
impl Sink for FailsBatch {
    async fn deliver(&self, batch_index: usize, assets: &[NormalizedAsset]) -> DeliveryOutcome {
        if batch_index == self.fail_index {
            DeliveryOutcome::failed(batch_index, assets.len(), Some(500), "ingest rejected batch")
        } else {
            self.delivered.fetch_add(assets.len(), Ordering::SeqCst);
            DeliveryOutcome::delivered(batch_index, assets.len(), Some(200))
        }
    }
}

#[tokio::test]
async fn test_failed_batch_does_not_abort_remaining_batches() {
    let assets: Vec<NormalizedAsset> = (0..1200)
        .map(|i| NormalizedAsset::new(format!("asset-{i:04}")))
        .collect();
    let sink = FailsBatch {
        fail_index: 1,
        delivered: AtomicUsize::new(0),
    };

    let outcomes = BatchUploader::new(500).deliver_all(&assets, &sink).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].success);
    assert!(!outcomes[1].success);
    assert!(outcomes[2].success);
    assert_eq!(outcomes[1].http_status, Some(500));
    // batches 1 and 3 still went out in full
    assert_eq!(sink.delivered.load(Ordering::SeqCst), 700);
    assert_eq!(outcomes.iter().filter(|o| o.success).count(), 2);
    assert_eq!(outcomes.iter().filter(|o| !o.success).count(), 1);
}

#[tokio::test]
async fn test_http_sink_posts_ndjson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let sink = HttpSink::new(client, format!("{}/ingest", server.uri()), AuthContext::None);

    let assets = vec![NormalizedAsset::new("a-1"), NormalizedAsset::new("a-2")];
    let outcome = sink.deliver(0, &assets).await;
    assert!(outcome.success);
    assert_eq!(outcome.http_status, Some(200));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("a-1"));
    assert!(lines[1].contains("a-2"));
}

#[tokio::test]
async fn test_upsert_matches_then_updates_or_creates() {
    let server = MockServer::start().await;

    // "alpha" matches an existing entity, "beta" does not
    Mock::given(method("POST"))
        .and(path("/entity-match"))
        .and(body_json(json!({"name": ["alpha"], "address": "10.0.0.1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "ent-1"}])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entity-match"))
        .and(body_json(json!({"name": ["beta"], "address": "10.0.0.2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entity/ent-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entity"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut alpha = NormalizedAsset::new("a-1");
    alpha.hostnames = vec!["alpha".to_string()];
    alpha.addresses = vec!["10.0.0.1".to_string()];
    let mut beta = NormalizedAsset::new("a-2");
    beta.hostnames = vec!["beta".to_string()];
    beta.addresses = vec!["10.0.0.2".to_string()];

    let sink = UpsertSink::new(
        reqwest::Client::new(),
        AuthContext::None,
        format!("{}/entity-match", server.uri()),
        format!("{}/entity", server.uri()),
        format!("{}/entity/{{id}}", server.uri()),
    );

    let outcome = sink.deliver(0, &[alpha, beta]).await;
    assert!(outcome.success);
    assert_eq!(outcome.record_count, 2);
}

#[tokio::test]
async fn test_upsert_record_failure_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/entity-match"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entity"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid entity"))
        .mount(&server)
        .await;

    let sink = UpsertSink::new(
        reqwest::Client::new(),
        AuthContext::None,
        format!("{}/entity-match", server.uri()),
        format!("{}/entity", server.uri()),
        format!("{}/entity/{{id}}", server.uri()),
    );

    let outcome = sink.deliver(0, &[NormalizedAsset::new("a-1")]).await;
    assert!(!outcome.success);
    assert_eq!(outcome.http_status, Some(422));
    assert!(outcome.error.as_deref().unwrap_or("").contains("1 of 1"));
}

struct FailsOneAsset;

#[async_trait]
impl Enricher for FailsOneAsset {
    async fn enrich(&self, asset: &mut NormalizedAsset) -> Result<()> {
        if asset.id == "asset-0001" {
            return Err(SyncError::fetch(500, "detail lookup failed"));
        }
        asset
            .custom_attributes
            .insert("software_0_product".to_string(), "nginx".to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_pipeline_end_to_end_with_enrichment_isolation() {
    let server = MockServer::start().await;
    // three records, one of them without an id
    let mut records = asset_records(0, 2);
    records
        .as_array_mut()
        .unwrap()
        .push(json!({"names": ["orphan"]}));
    mount_offset_page(&server, 0, records).await;

    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let source = OffsetPager::new(format!("{}/org/assets", server.uri()), AuthContext::None, 100);
    let fetcher = fetcher();
    let sink = HttpSink::new(
        fetcher.client().clone(),
        format!("{}/ingest", server.uri()),
        AuthContext::None,
    );
    let pipeline = Pipeline::new(fetcher, 500);

    let summary = pipeline
        .run(&source, &inventory_rules(), Some(&FailsOneAsset), &sink)
        .await
        .unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.transformed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.enrich_failures, 1);
    assert_eq!(summary.batches_succeeded, 1);
    assert_eq!(summary.batches_failed, 0);
    assert!(summary.fetch_error.is_none());
}
