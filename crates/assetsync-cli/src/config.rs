//! Configuration for sync runs
//!
//! Everything is supplied from the environment (or `.env` via dotenvy) and
//! can be overridden per invocation with CLI flags; nothing is hardcoded in
//! the pipeline itself.

use assetsync_core::fetch::AuthContext;
use assetsync_core::sink::DEFAULT_BATCH_SIZE;

pub use assetsync_core::fetch::DEFAULT_TIMEOUT_SECS;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default source page size when not specified.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Run configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Source API endpoint URL (the asset listing endpoint)
    pub source_url: Option<String>,

    /// Bearer token for the source API
    pub api_token: Option<String>,

    /// Basic-auth credentials for sources that use them (e.g. IPAM systems)
    pub basic_user: Option<String>,
    pub basic_password: Option<String>,

    /// Search/filter expression passed through to the source
    pub search: Option<String>,

    pub page_size: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            source_url: None,
            api_token: None,
            basic_user: None,
            basic_password: None,
            search: None,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from environment variables
    ///
    /// - `ASSETSYNC_SOURCE_URL`: source asset endpoint
    /// - `ASSETSYNC_API_TOKEN`: bearer token
    /// - `ASSETSYNC_BASIC_USER` / `ASSETSYNC_BASIC_PASSWORD`: basic auth
    /// - `ASSETSYNC_SEARCH`: search expression
    /// - `ASSETSYNC_PAGE_SIZE`, `ASSETSYNC_BATCH_SIZE`, `ASSETSYNC_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(url) = std::env::var("ASSETSYNC_SOURCE_URL") {
            config.source_url = Some(url);
        }
        if let Ok(token) = std::env::var("ASSETSYNC_API_TOKEN") {
            config.api_token = Some(token);
        }
        if let Ok(user) = std::env::var("ASSETSYNC_BASIC_USER") {
            config.basic_user = Some(user);
        }
        if let Ok(password) = std::env::var("ASSETSYNC_BASIC_PASSWORD") {
            config.basic_password = Some(password);
        }
        if let Ok(search) = std::env::var("ASSETSYNC_SEARCH") {
            config.search = Some(search);
        }
        if let Ok(size) = std::env::var("ASSETSYNC_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                config.page_size = size;
            }
        }
        if let Ok(size) = std::env::var("ASSETSYNC_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                config.batch_size = size;
            }
        }
        if let Ok(secs) = std::env::var("ASSETSYNC_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.timeout_secs = secs;
            }
        }

        config
    }

    /// Build the auth context for the source API: bearer token when present,
    /// basic credentials otherwise.
    pub fn auth_context(&self) -> AuthContext {
        if let Some(token) = &self.api_token {
            return AuthContext::Bearer(token.clone());
        }
        if let Some(user) = &self.basic_user {
            return AuthContext::Basic {
                user: user.clone(),
                password: self.basic_password.clone(),
            };
        }
        AuthContext::None
    }
}
