//! Upsert assets into a second REST API

use super::{print_summary, RunContext};
use anyhow::Result;
use assetsync_core::pipeline::Pipeline;
use assetsync_core::sink::UpsertSink;
use assetsync_core::transform::{Enricher, HttpDetailEnricher};
use tracing::info;

pub async fn run(
    ctx: &RunContext,
    match_url: &str,
    create_url: &str,
    update_url: &str,
    detail_url: Option<&str>,
    detail_prefix: &str,
) -> Result<()> {
    let fetcher = ctx.fetcher()?;

    // destination credentials are separate from the source's; the upsert APIs
    // observed so far authenticate via headers, which callers can extend here
    let sink = UpsertSink::new(
        fetcher.client().clone(),
        assetsync_core::fetch::AuthContext::None,
        match_url,
        create_url,
        update_url,
    );

    let enricher: Option<HttpDetailEnricher> = detail_url.map(|url| {
        HttpDetailEnricher::new(
            fetcher.client().clone(),
            url,
            ctx.config.auth_context(),
            detail_prefix,
        )
    });

    let source = ctx.source()?;
    let pipeline = Pipeline::new(fetcher, ctx.config.batch_size);

    info!(match_url = %match_url, "upserting assets into destination API");
    let summary = pipeline
        .run(
            &source,
            &ctx.rules,
            enricher.as_ref().map(|e| e as &dyn Enricher),
            &sink,
        )
        .await?;
    print_summary(&summary)
}
