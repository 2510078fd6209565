//! Configuration types and loading for the application.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::groupme::GroupMeClient;
use crate::paths::{expand_str_path, write_default_config};
use crate::present::DEFAULT_DATE_FORMAT;
use crate::source::DEFAULT_MESSAGE_LIMIT;
use crate::{AppPaths, env_prefix};

/// Group searched when no `--group` is given.
pub const DEFAULT_GROUP: &str = "ACM";

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for grepme"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// GroupMe API access.
    pub api: ApiConfig,

    /// Search defaults.
    pub search: SearchConfig,

    /// Custom paths for data directories.
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        if !paths.config_file.exists() {
            write_default_config(&paths.config_file)?;
            log::info!("created default config at {}", paths.config_file.display());
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "warn")?
            .set_default("api.base_url", GroupMeClient::DEFAULT_BASE_URL)?
            .set_default("api.page_size", DEFAULT_MESSAGE_LIMIT as i64)?
            .set_default("api.timeout", 60_i64)?
            .set_default("search.default_group", DEFAULT_GROUP)?
            .set_default("search.date_format", DEFAULT_DATE_FORMAT)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref dir) = config.paths.data_dir {
            let expanded = expand_str_path(dir)?;
            config.paths.data_dir = Some(expanded.display().to_string());
        }

        Ok(config)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors (default).
    #[default]
    Warn,
    /// Emit informational messages and above.
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl LogLevel {
    /// The matching `log` filter.
    #[must_use]
    pub const fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

/// GroupMe API configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "GroupMe API access")]
pub struct ApiConfig {
    /// API base URL.
    pub base_url: String,

    /// Access token. Prefer `grepme --save-token` or `GREPME_TOKEN` over
    /// storing it here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Messages requested per page (the API caps this at 100).
    #[schemars(range(min = 1, max = 100))]
    pub page_size: usize,

    /// Request timeout in seconds.
    #[schemars(range(min = 1))]
    pub timeout: u64,
}

impl ApiConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: GroupMeClient::DEFAULT_BASE_URL.to_string(),
            token: None,
            page_size: DEFAULT_MESSAGE_LIMIT,
            timeout: 60,
        }
    }
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Search defaults")]
pub struct SearchConfig {
    /// Group name pattern used when no `--group` is given.
    pub default_group: String,

    /// `strftime` format for `--date` output.
    pub date_format: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_group: DEFAULT_GROUP.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Path override configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Custom paths for data directories")]
pub struct PathsConfig {
    /// Directory for persistent data such as the stored token. Supports ~ and
    /// environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}
