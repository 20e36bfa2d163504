//! Logging initialization
//!
//! Console tracing with an env-configurable level and text or JSON output.
//! Use the structured macros (`info!`, `warn!`, `error!`) with fields; never
//! `println!` for diagnostics — stdout is reserved for the run summary.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LogConfig {
    /// Load from `ASSETSYNC_LOG_LEVEL` / `ASSETSYNC_LOG_FORMAT`, falling back
    /// to the given defaults when unset or unparseable.
    pub fn from_env(defaults: LogConfig) -> Self {
        let mut config = defaults;
        if let Ok(level) = std::env::var("ASSETSYNC_LOG_LEVEL") {
            if let Ok(level) = level.parse() {
                config.level = level;
            }
        }
        if let Ok(format) = std::env::var("ASSETSYNC_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                config.format = format;
            }
        }
        config
    }
}

/// Initialize the global tracing subscriber. Call once at startup; logs go to
/// stderr so the summary on stdout stays machine-readable.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    match config.format {
        LogFormat::Text => {
            let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
    }

    Ok(())
}
