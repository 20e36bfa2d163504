//! Command implementations
//!
//! Each subcommand assembles one pipeline run: a paged source built from the
//! merged env/flag configuration, the mapping rules, and a sink.

pub mod export_file;
pub mod export_http;
pub mod sync_upsert;

use crate::config::Config;
use crate::Cli;
use anyhow::{Context, Result};
use assetsync_core::fetch::{OffsetPager, PagedFetcher};
use assetsync_core::model::RunSummary;
use assetsync_core::transform::MappingRules;
use std::time::Duration;

/// Merged configuration for one run: environment first, flags override.
pub struct RunContext {
    pub config: Config,
    pub rules: MappingRules,
}

impl RunContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::from_env();
        if let Some(url) = &cli.source_url {
            config.source_url = Some(url.clone());
        }
        if let Some(search) = &cli.search {
            config.search = Some(search.clone());
        }
        if let Some(size) = cli.page_size {
            config.page_size = size;
        }
        if let Some(size) = cli.batch_size {
            config.batch_size = size;
        }
        if let Some(secs) = cli.timeout_secs {
            config.timeout_secs = secs;
        }

        let rules = match &cli.rules {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read rules file {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("invalid mapping rules in {}", path.display()))?
            }
            None => default_inventory_rules(),
        };

        Ok(Self { config, rules })
    }

    pub fn source_url(&self) -> Result<&str> {
        self.config
            .source_url
            .as_deref()
            .context("no source URL configured; set ASSETSYNC_SOURCE_URL or pass --source-url")
    }

    pub fn fetcher(&self) -> Result<PagedFetcher> {
        Ok(PagedFetcher::new(Duration::from_secs(
            self.config.timeout_secs,
        ))?)
    }

    /// Offset-paged source over the configured asset endpoint
    pub fn source(&self) -> Result<OffsetPager> {
        let mut source = OffsetPager::new(
            self.source_url()?,
            self.config.auth_context(),
            self.config.page_size,
        );
        if let Some(search) = &self.config.search {
            source = source.with_query("search", search);
        }
        Ok(source)
    }
}

/// Mapping rules for the inventory platform's asset export shape; used when
/// no rules file is supplied.
pub fn default_inventory_rules() -> MappingRules {
    let mut rules = MappingRules::new("id");
    rules.hostname_fields = vec!["names".to_string()];
    rules.address_fields = vec!["addresses".to_string()];
    rules.mac_field = Some("macs".to_string());
    rules.os_field = Some("os".to_string());
    rules.os_version_field = Some("os_version".to_string());
    rules.manufacturer_field = Some("hw_vendor".to_string());
    rules.model_field = Some("hw_product".to_string());
    rules.timestamp_fields = vec!["first_seen".to_string(), "last_seen".to_string()];
    rules
}

/// Print the run summary as pretty JSON on stdout.
pub fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
