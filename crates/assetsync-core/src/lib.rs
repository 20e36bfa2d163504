//! AssetSync Core
//!
//! A small library for one-shot asset sync runs: page through a source REST
//! API, normalize vendor-shaped records into canonical assets, and deliver
//! them in batches to a destination sink (bulk HTTP ingest, local file, or a
//! second API with upsert semantics).
//!
//! # Example
//!
//! ```no_run
//! use assetsync_core::fetch::{AuthContext, OffsetPager, PagedFetcher};
//! use assetsync_core::pipeline::Pipeline;
//! use assetsync_core::sink::{HttpSink, DEFAULT_BATCH_SIZE};
//! use assetsync_core::transform::MappingRules;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> assetsync_core::Result<()> {
//!     let fetcher = PagedFetcher::new(Duration::from_secs(60))?;
//!     let source = OffsetPager::new(
//!         "https://inventory.example.com/api/v1.0/org/assets",
//!         AuthContext::Bearer("token".into()),
//!         100,
//!     )
//!     .with_query("search", "alive:t");
//!     let sink = HttpSink::new(
//!         fetcher.client().clone(),
//!         "https://ingest.example.com/bulk",
//!         AuthContext::None,
//!     );
//!
//!     let pipeline = Pipeline::new(fetcher, DEFAULT_BATCH_SIZE);
//!     let rules = MappingRules::new("id");
//!     let summary = pipeline.run(&source, &rules, None, &sink).await?;
//!     println!("{}", serde_json::to_string_pretty(&summary)?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetch;
pub mod flatten;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod transform;

pub use error::{Result, SyncError};
pub use model::{Cursor, DeliveryOutcome, NormalizedAsset, Page, RunSummary, SourceRecord};
