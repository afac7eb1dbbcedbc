use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::models::OutputFormat;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the archive lives and how much to read by default
    pub archive: ArchiveConfig,
    /// Live-tail settings
    pub watch: WatchConfig,
    /// Log level, destination and format
    pub logging: LoggingConfig,
    /// Rendering of records
    pub output: OutputConfig,
    /// Outbound send pathway
    pub send: SendConfig,
}

/// Archive location and query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Path to chat.db; a leading `~` is expanded
    pub database_path: String,
    /// Row limit when the caller gives none
    pub default_limit: usize,
}

/// Live-tail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Pause between polls
    pub poll_interval_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional rolling log file
    pub file_path: Option<String>,
    /// File log format, "json" or "text"
    pub format: String,
}

/// Rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "txt", "csv" or "json"
    pub format: String,
    /// Characters of body text shown before truncating
    pub preview_chars: usize,
}

/// Send pathway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Service used when targeting a handle: "iMessage" or "SMS"
    pub service: String,
    /// Directory files are copied into before sending; a leading `~` is expanded
    pub staging_dir: String,
    /// AppleScript interpreter
    pub osascript_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig {
                database_path: "~/Library/Messages/chat.db".to_string(),
                default_limit: 20,
            },
            watch: WatchConfig {
                poll_interval_ms: 250,
            },
            logging: LoggingConfig {
                level: "warn".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            output: OutputConfig {
                format: "txt".to_string(),
                preview_chars: 120,
            },
            send: SendConfig {
                service: "iMessage".to_string(),
                staging_dir: "~/Library/Messages/Attachments/imsg".to_string(),
                osascript_path: "/usr/bin/osascript".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    ///
    /// Defaults, then `config/default.*`, `config/local.*`, then `extra_file`
    /// if given, then `IMSG__SECTION__KEY` environment variables.
    pub fn load(extra_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(
                Config::try_from(&Self::default())
                    .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?,
            )
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("IMSG").prefix_separator("__").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.archive.database_path.trim().is_empty() {
            return Err(anyhow::anyhow!("database_path must not be empty"));
        }
        if self.archive.default_limit == 0 {
            return Err(anyhow::anyhow!("default_limit must be greater than 0"));
        }

        if self.watch.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("poll_interval_ms must be greater than 0"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        if OutputFormat::from_name(&self.output.format).is_none() {
            return Err(anyhow::anyhow!(
                "Invalid output format: {}. Must be one of: [\"txt\", \"csv\", \"json\"]",
                self.output.format
            ));
        }
        if self.output.preview_chars == 0 {
            return Err(anyhow::anyhow!("preview_chars must be greater than 0"));
        }

        let valid_services = ["iMessage", "SMS"];
        if !valid_services.contains(&self.send.service.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid send service: {}. Must be one of: {:?}",
                self.send.service,
                valid_services
            ));
        }

        Ok(())
    }

    /// Archive path with the home alias expanded
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        crate::attachment::expand_home(&self.archive.database_path)
    }

    /// Staging directory with the home alias expanded
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        crate::attachment::expand_home(&self.send.staging_dir)
    }

    /// Poll interval as a duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }

    /// Configured default output format
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_name(&self.output.format).unwrap_or_default()
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Effective configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
