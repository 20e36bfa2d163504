//! Export assets to a bulk HTTP ingest endpoint

use super::{print_summary, RunContext};
use crate::HttpBodyFormat;
use anyhow::Result;
use assetsync_core::fetch::AuthContext;
use assetsync_core::pipeline::Pipeline;
use assetsync_core::sink::{HttpSink, PayloadFormat};
use tracing::info;

pub async fn run(ctx: &RunContext, endpoint: &str, format: HttpBodyFormat) -> Result<()> {
    let fetcher = ctx.fetcher()?;
    let sink = HttpSink::new(fetcher.client().clone(), endpoint, AuthContext::None)
        .with_format(match format {
            HttpBodyFormat::Ndjson => PayloadFormat::Ndjson,
            HttpBodyFormat::JsonArray => PayloadFormat::JsonArray,
        });

    let source = ctx.source()?;
    let pipeline = Pipeline::new(fetcher, ctx.config.batch_size);

    info!(endpoint = %endpoint, "exporting assets to HTTP endpoint");
    let summary = pipeline.run(&source, &ctx.rules, None, &sink).await?;
    print_summary(&summary)
}
