//! Diagnostic logging setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for the
//! command output that scripts parse.

use std::env;
use std::io;
use std::str::FromStr;

use stepmigrate_core::ConfigError;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "STEPMIGRATE_LOG";
pub const LOG_FORMAT_ENV: &str = "STEPMIGRATE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                field: LOG_FORMAT_ENV.to_string(),
                value: s.to_string(),
                expected: "one of compact, pretty, json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level used when no filter directive is given
    pub level: String,
    /// Filter directives such as "stepmigrate_core=debug,sqlx=warn"
    pub env_filter: Option<String>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            env_filter: None,
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Read `STEPMIGRATE_LOG` (falling back to `RUST_LOG`) and
    /// `STEPMIGRATE_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let format = match non_empty(LOG_FORMAT_ENV) {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            env_filter: non_empty(LOG_ENV).or_else(|| non_empty("RUST_LOG")),
            format,
            ..Self::default()
        })
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directives = config.env_filter.as_deref().unwrap_or(&config.level);
    let filter = EnvFilter::try_new(directives)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?,
        LogFormat::Pretty => registry
            .with(Layer::new().with_writer(io::stderr).pretty())
            .try_init()?,
        LogFormat::Compact => registry
            .with(Layer::new().with_writer(io::stderr).compact())
            .try_init()?,
    }

    tracing::debug!(filter = directives, format = ?config.format, "logging initialized");
    Ok(())
}
