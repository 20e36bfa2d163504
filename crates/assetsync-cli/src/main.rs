//! AssetSync - Main entry point

use anyhow::Result;
use assetsync_cli::commands::{self, RunContext};
use assetsync_cli::logging::{init_logging, LogConfig, LogLevel};
use assetsync_cli::{Cli, Commands};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    // Load .env before reading configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let defaults = LogConfig {
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        },
        ..LogConfig::default()
    };
    // Environment variables take precedence over the verbose flag
    let log_config = LogConfig::from_env(defaults);
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "run failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    let ctx = RunContext::from_cli(cli)?;

    match &cli.command {
        Commands::ExportHttp { endpoint, format } => {
            commands::export_http::run(&ctx, endpoint, *format).await
        }

        Commands::ExportFile { output, format } => {
            commands::export_file::run(&ctx, output, *format).await
        }

        Commands::SyncUpsert {
            match_url,
            create_url,
            update_url,
            detail_url,
            detail_prefix,
        } => {
            commands::sync_upsert::run(
                &ctx,
                match_url,
                create_url,
                update_url,
                detail_url.as_deref(),
                detail_prefix,
            )
            .await
        }
    }
}
