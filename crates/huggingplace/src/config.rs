//! Client configuration.
//!
//! [`HuggingPlaceConfig`] holds the account context and transport settings for
//! both the log endpoint and the trace sender. It is validated once when the
//! client is built and again on every [`ConfigUpdate`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use huggingplace_trace::{
    DEFAULT_BASE_URL, DEFAULT_BATCH_REQUEST_TIMEOUT, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, TraceConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::{HuggingPlaceError, Result};

const REDACTED: &str = "[REDACTED]";

/// Default request timeout for the log endpoint.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Environment variable names read by [`HuggingPlaceConfig::from_env`].
pub mod env {
    pub const API_KEY: &str = "HUGGINGPLACE_API_KEY";
    pub const ORG_ID: &str = "HUGGINGPLACE_ORG_ID";
    pub const MODE: &str = "HUGGINGPLACE_MODE";
    pub const BASE_URL: &str = "HUGGINGPLACE_BASE_URL";
    pub const TIMEOUT: &str = "HUGGINGPLACE_TIMEOUT";
    pub const SILENT: &str = "HUGGINGPLACE_SILENT";
}

/// Deployment mode reported with every log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Prod,
    Dev,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Prod => "prod",
            Mode::Dev => "dev",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = HuggingPlaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(Mode::Prod),
            "dev" => Ok(Mode::Dev),
            other => Err(HuggingPlaceError::Configuration(format!(
                "Mode must be either \"prod\" or \"dev\", got \"{}\"",
                other
            ))),
        }
    }
}

/// Configuration for the [`HuggingPlace`](crate::HuggingPlace) client.
///
/// `Debug` output redacts the API key.
#[derive(Clone, PartialEq)]
pub struct HuggingPlaceConfig {
    /// Bearer token for every request.
    pub api_key: String,

    /// Organization the logs belong to.
    pub org_id: String,

    /// API base URL.
    pub base_url: String,

    pub mode: Mode,

    /// Timeout for log requests and single trace requests.
    pub timeout: Duration,

    /// Suppress informational log events.
    pub silent: bool,

    /// Trace batch capacity. `1` disables batching.
    pub trace_batch_size: usize,

    /// Idle time before a partial trace batch is flushed.
    pub trace_batch_timeout: Duration,

    /// Retries after the first trace delivery attempt.
    pub trace_max_retries: u32,

    /// Base delay for trace retry backoff.
    pub trace_retry_delay: Duration,

    /// Timeout for one trace batch request.
    pub trace_batch_request_timeout: Duration,
}

impl HuggingPlaceConfig {
    /// Create a config with the required credentials and defaults for everything else.
    pub fn new(api_key: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            org_id: org_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: Mode::default(),
            timeout: DEFAULT_TIMEOUT,
            silent: false,
            trace_batch_size: DEFAULT_BATCH_SIZE,
            trace_batch_timeout: DEFAULT_BATCH_TIMEOUT,
            trace_max_retries: DEFAULT_MAX_RETRIES,
            trace_retry_delay: DEFAULT_RETRY_DELAY,
            trace_batch_request_timeout: DEFAULT_BATCH_REQUEST_TIMEOUT,
        }
    }

    /// Build a config from `HUGGINGPLACE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from a variable lookup function.
    ///
    /// Missing credentials are left empty and reported by [`validate`](Self::validate).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(
            get(env::API_KEY).unwrap_or_default(),
            get(env::ORG_ID).unwrap_or_default(),
        );
        if let Some(mode) = get(env::MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(base_url) = get(env::BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(timeout) = get(env::TIMEOUT) {
            config.timeout = parse_millis(env::TIMEOUT, &timeout)?;
        }
        if let Some(silent) = get(env::SILENT) {
            config.silent = parse_flag(&silent);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_trace_batch_size(mut self, batch_size: usize) -> Self {
        self.trace_batch_size = batch_size;
        self
    }

    pub fn with_trace_batch_timeout(mut self, timeout: Duration) -> Self {
        self.trace_batch_timeout = timeout;
        self
    }

    pub fn with_trace_max_retries(mut self, retries: u32) -> Self {
        self.trace_max_retries = retries;
        self
    }

    pub fn with_trace_retry_delay(mut self, delay: Duration) -> Self {
        self.trace_retry_delay = delay;
        self
    }

    pub fn with_trace_batch_request_timeout(mut self, timeout: Duration) -> Self {
        self.trace_batch_request_timeout = timeout;
        self
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(HuggingPlaceError::Configuration(
                "API key is required".to_string(),
            ));
        }
        if self.org_id.trim().is_empty() {
            return Err(HuggingPlaceError::Configuration(
                "Organization ID is required".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(HuggingPlaceError::Configuration(
                "Base URL must not be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(HuggingPlaceError::Configuration(
                "Timeout must be a positive number".to_string(),
            ));
        }
        if self.trace_batch_size == 0 {
            return Err(HuggingPlaceError::Configuration(
                "Trace batch size must be at least 1".to_string(),
            ));
        }
        if self.trace_batch_timeout.is_zero() || self.trace_batch_request_timeout.is_zero() {
            return Err(HuggingPlaceError::Configuration(
                "Trace timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, returning the merged config. Unset fields keep
    /// their current values.
    pub fn merged(&self, update: ConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(v) = update.api_key {
            next.api_key = v;
        }
        if let Some(v) = update.org_id {
            next.org_id = v;
        }
        if let Some(v) = update.base_url {
            next.base_url = v;
        }
        if let Some(v) = update.mode {
            next.mode = v;
        }
        if let Some(v) = update.timeout {
            next.timeout = v;
        }
        if let Some(v) = update.silent {
            next.silent = v;
        }
        if let Some(v) = update.trace_batch_size {
            next.trace_batch_size = v;
        }
        if let Some(v) = update.trace_batch_timeout {
            next.trace_batch_timeout = v;
        }
        if let Some(v) = update.trace_max_retries {
            next.trace_max_retries = v;
        }
        if let Some(v) = update.trace_retry_delay {
            next.trace_retry_delay = v;
        }
        if let Some(v) = update.trace_batch_request_timeout {
            next.trace_batch_request_timeout = v;
        }
        next
    }

    /// Trace sender settings derived from this config.
    pub fn to_trace_config(&self) -> TraceConfig {
        TraceConfig::new(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_batch_size(self.trace_batch_size)
            .with_batch_timeout(self.trace_batch_timeout)
            .with_max_retries(self.trace_max_retries)
            .with_retry_delay(self.trace_retry_delay)
            .with_request_timeout(self.timeout)
            .with_batch_request_timeout(self.trace_batch_request_timeout)
            .with_silent(self.silent)
    }

    /// A view of the config that is safe to print.
    pub fn public(&self) -> PublicConfig {
        PublicConfig {
            org_id: self.org_id.clone(),
            base_url: self.base_url.clone(),
            mode: self.mode,
            timeout_ms: duration_ms(self.timeout),
            silent: self.silent,
            trace_batch_size: self.trace_batch_size,
            trace_batch_timeout_ms: duration_ms(self.trace_batch_timeout),
            trace_max_retries: self.trace_max_retries,
            trace_retry_delay_ms: duration_ms(self.trace_retry_delay),
            has_api_key: !self.api_key.is_empty(),
        }
    }
}

/// Partial configuration for [`HuggingPlace::update_config`](crate::HuggingPlace::update_config).
#[derive(Clone, Default, PartialEq)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub org_id: Option<String>,
    pub base_url: Option<String>,
    pub mode: Option<Mode>,
    pub timeout: Option<Duration>,
    pub silent: Option<bool>,
    pub trace_batch_size: Option<usize>,
    pub trace_batch_timeout: Option<Duration>,
    pub trace_max_retries: Option<u32>,
    pub trace_retry_delay: Option<Duration>,
    pub trace_batch_request_timeout: Option<Duration>,
}

impl fmt::Debug for HuggingPlaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingPlaceConfig")
            .field("api_key", &REDACTED)
            .field("org_id", &self.org_id)
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("silent", &self.silent)
            .field("trace_batch_size", &self.trace_batch_size)
            .field("trace_batch_timeout", &self.trace_batch_timeout)
            .field("trace_max_retries", &self.trace_max_retries)
            .field("trace_retry_delay", &self.trace_retry_delay)
            .field("trace_batch_request_timeout", &self.trace_batch_request_timeout)
            .finish()
    }
}

impl fmt::Debug for ConfigUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigUpdate")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("org_id", &self.org_id)
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("silent", &self.silent)
            .field("trace_batch_size", &self.trace_batch_size)
            .field("trace_batch_timeout", &self.trace_batch_timeout)
            .field("trace_max_retries", &self.trace_max_retries)
            .field("trace_retry_delay", &self.trace_retry_delay)
            .field("trace_batch_request_timeout", &self.trace_batch_request_timeout)
            .finish()
    }
}

/// Configuration without credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub org_id: String,
    pub base_url: String,
    pub mode: Mode,
    pub timeout_ms: u64,
    pub silent: bool,
    pub trace_batch_size: usize,
    pub trace_batch_timeout_ms: u64,
    pub trace_max_retries: u32,
    pub trace_retry_delay_ms: u64,
    pub has_api_key: bool,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| {
            HuggingPlaceError::Configuration(format!(
                "{} must be a positive number of milliseconds, got \"{}\"",
                name, value
            ))
        })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
