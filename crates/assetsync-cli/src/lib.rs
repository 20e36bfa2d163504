//! AssetSync CLI
//!
//! One-shot sync runs between an asset-inventory REST API and third-party
//! sinks: bulk HTTP ingest endpoints, local files, and upsert-style APIs.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod config;
pub mod logging;

#[derive(Parser, Debug)]
#[command(name = "assetsync")]
#[command(author, version, about = "One-shot asset sync between an inventory API and third-party sinks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Source asset endpoint URL (overrides ASSETSYNC_SOURCE_URL)
    #[arg(long, global = true)]
    pub source_url: Option<String>,

    /// Search/filter expression passed to the source (overrides ASSETSYNC_SEARCH)
    #[arg(long, global = true)]
    pub search: Option<String>,

    /// Path to a JSON mapping-rules file; defaults to the built-in inventory rules
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Source page size
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Delivery batch size
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export normalized assets to a bulk HTTP ingest endpoint
    ExportHttp {
        /// Destination endpoint URL
        #[arg(long)]
        endpoint: String,

        /// Request body encoding
        #[arg(long, value_enum, default_value_t = HttpBodyFormat::Ndjson)]
        format: HttpBodyFormat,
    },

    /// Export normalized assets to a local file (truncate-then-write)
    ExportFile {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output file format
        #[arg(long, value_enum, default_value_t = OutputFormat::Ndjson)]
        format: OutputFormat,
    },

    /// Upsert normalized assets into a second REST API (match, then update or create)
    SyncUpsert {
        /// Match/lookup endpoint URL
        #[arg(long)]
        match_url: String,

        /// Create endpoint URL for unmatched assets
        #[arg(long)]
        create_url: String,

        /// Update endpoint URL template containing an `{id}` placeholder
        #[arg(long)]
        update_url: String,

        /// Optional per-asset detail endpoint template containing an `{id}`
        /// placeholder; the flattened response enriches each asset
        #[arg(long)]
        detail_url: Option<String>,

        /// Attribute prefix for enrichment lookups
        #[arg(long, default_value = "detail")]
        detail_prefix: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpBodyFormat {
    /// One JSON object per line
    Ndjson,
    /// A single JSON array body
    JsonArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Ndjson,
    Csv,
}
