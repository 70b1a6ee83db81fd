//! Configuration file support for the `huggingplace` CLI.
//!
//! Settings live in `.huggingplace/config.toml`. Discovery searches for that
//! file starting from the current directory and walking up to parent
//! directories. Values from the file sit below environment variables and
//! command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use huggingplace::{HuggingPlaceConfig, Mode};
use serde::{Deserialize, Serialize};

/// The huggingplace data directory name.
pub const HUGGINGPLACE_DIR: &str = ".huggingplace";
/// The config file name within the huggingplace directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Contents of `.huggingplace/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub base_url: Option<String>,
    /// `prod` or `dev`.
    pub mode: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    pub silent: Option<bool>,
    /// Trace sender settings.
    pub trace: TraceSection,
}

/// `[trace]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceSection {
    pub batch_size: Option<usize>,
    pub batch_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub batch_request_timeout_ms: Option<u64>,
}

/// Values supplied on the command line or through `HUGGINGPLACE_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub base_url: Option<String>,
    pub mode: Option<String>,
    pub timeout_ms: Option<u64>,
    pub silent: bool,
}

impl FileConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Returns the config and the path of the file it came from.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let config_path = dir.join(HUGGINGPLACE_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Load from an explicit path, or by discovery when none is given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let path = if path.is_dir() {
                path.join(CONFIG_FILE)
            } else {
                path.to_path_buf()
            };
            let config = Self::from_file(&path)?;
            tracing::debug!("Loaded config from {}", path.display());
            return Ok(config);
        }

        match Self::find_and_load()? {
            Some((config, path)) => {
                tracing::debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            None => {
                tracing::debug!("No .huggingplace/config.toml found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate the file's own values.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if let Some(ref mode) = self.mode {
            if mode.parse::<Mode>().is_err() {
                errors.push(ConfigValidationError {
                    field: "mode".to_string(),
                    message: format!("Invalid mode '{}'. Expected 'prod' or 'dev'.", mode),
                });
            }
        }

        if self.timeout_ms == Some(0) {
            errors.push(ConfigValidationError {
                field: "timeout_ms".to_string(),
                message: "Timeout must be a positive number".to_string(),
            });
        }

        if self.trace.batch_size == Some(0) {
            errors.push(ConfigValidationError {
                field: "trace.batch_size".to_string(),
                message: "Batch size must be at least 1".to_string(),
            });
        }

        errors
    }

    /// Combine file values with overrides into a client configuration.
    ///
    /// Overrides win over the file; the file wins over built-in defaults.
    pub fn resolve(&self, overrides: &Overrides) -> Result<HuggingPlaceConfig> {
        let pick = |cli: &Option<String>, file: &Option<String>| {
            cli.clone().or_else(|| file.clone()).unwrap_or_default()
        };

        let mut config = HuggingPlaceConfig::new(
            pick(&overrides.api_key, &self.api_key),
            pick(&overrides.org_id, &self.org_id),
        );

        if let Some(base_url) = overrides.base_url.clone().or_else(|| self.base_url.clone()) {
            config = config.with_base_url(base_url);
        }
        if let Some(mode) = overrides.mode.as_ref().or(self.mode.as_ref()) {
            config = config.with_mode(mode.parse()?);
        }
        if let Some(ms) = overrides.timeout_ms.or(self.timeout_ms) {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config = config.with_silent(overrides.silent || self.silent.unwrap_or(false));

        let trace = &self.trace;
        if let Some(size) = trace.batch_size {
            config = config.with_trace_batch_size(size);
        }
        if let Some(ms) = trace.batch_timeout_ms {
            config = config.with_trace_batch_timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = trace.max_retries {
            config = config.with_trace_max_retries(retries);
        }
        if let Some(ms) = trace.retry_delay_ms {
            config = config.with_trace_retry_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = trace.batch_request_timeout_ms {
            config = config.with_trace_batch_request_timeout(Duration::from_millis(ms));
        }

        Ok(config)
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}
