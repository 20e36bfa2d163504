//! Export assets to a local file

use super::{print_summary, RunContext};
use crate::OutputFormat;
use anyhow::Result;
use assetsync_core::pipeline::Pipeline;
use assetsync_core::sink::{FileFormat, FileSink};
use std::path::Path;
use tracing::info;

pub async fn run(ctx: &RunContext, output: &Path, format: OutputFormat) -> Result<()> {
    let sink = FileSink::new(
        output,
        match format {
            OutputFormat::Ndjson => FileFormat::Ndjson,
            OutputFormat::Csv => FileFormat::Csv,
        },
    );

    let fetcher = ctx.fetcher()?;
    let source = ctx.source()?;
    let pipeline = Pipeline::new(fetcher, ctx.config.batch_size);

    info!(output = %output.display(), "exporting assets to file");
    let summary = pipeline.run(&source, &ctx.rules, None, &sink).await?;
    print_summary(&summary)
}
