//! Configuration layer: typed settings with layered precedence (defaults → file → environment).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "ombra";
const ENV_PREFIX: &str = "OMBRA";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CACHE_ROOT: &str = "artifact-cache";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Output format of the installed tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawCacheSettings {
    root: Option<PathBuf>,
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Validated settings for the pipeline and its cache.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Root directory of the artifact cache tree.
    pub root: PathBuf,
    /// Disables the cache listener entirely when false.
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Settings {
    /// Load settings from `ombra.toml` (or an explicit file) layered under
    /// `OMBRA_`-prefixed environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match config_file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let level = match raw.logging.level {
            None => LevelFilter::INFO,
            Some(value) => value
                .parse::<LevelFilter>()
                .map_err(|_| ConfigError::InvalidLogLevel(value))?,
        };

        Ok(Self {
            cache: CacheSettings {
                root: raw
                    .cache
                    .root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT)),
                enabled: raw.cache.enabled.unwrap_or(true),
            },
            logging: LoggingSettings {
                level,
                format: raw.logging.format.unwrap_or(LogFormat::Compact),
            },
        })
    }
}
