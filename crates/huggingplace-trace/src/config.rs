//! Trace delivery configuration.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, TraceError};

/// Default HuggingPlace API base URL.
pub const DEFAULT_BASE_URL: &str = "https://anvsj57nul.execute-api.ap-south-1.amazonaws.com";

/// Records per batch before a size flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Idle time before a partial batch is flushed.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Retries after the first attempt before a record is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Request timeout for single-record sends.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Request timeout for batch sends.
pub const DEFAULT_BATCH_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// How long `shutdown` waits for in-flight deliveries.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Configuration for the trace sender and its HTTP transport.
///
/// `Debug` output redacts the API key.
#[derive(Clone)]
pub struct TraceConfig {
    /// Base URL the trace endpoints hang off.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_key: String,

    /// Batch capacity. `1` disables batching.
    pub batch_size: usize,

    /// Idle timeout that flushes a partial batch.
    pub batch_timeout: Duration,

    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `retry_delay * 2^n`.
    pub retry_delay: Duration,

    /// Timeout for one single-record request.
    pub request_timeout: Duration,

    /// Timeout for one batch request.
    pub batch_request_timeout: Duration,

    /// Upper bound on the in-flight drain in `TraceSender::shutdown`.
    pub shutdown_timeout: Duration,

    /// Suppress informational log events.
    pub silent: bool,

    /// Extra static headers attached to every request.
    pub headers: HashMap<String, String>,
}

impl TraceConfig {
    /// Create a config with the given API key and defaults for everything else.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_request_timeout: DEFAULT_BATCH_REQUEST_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            silent: false,
            headers: HashMap::new(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the batch capacity.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the idle flush timeout.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base backoff delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the single-record request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the batch request timeout.
    pub fn with_batch_request_timeout(mut self, timeout: Duration) -> Self {
        self.batch_request_timeout = timeout;
        self
    }

    /// Set how long shutdown waits for in-flight deliveries.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Attach an extra header to every trace request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Whether records are buffered before sending.
    pub fn batching_enabled(&self) -> bool {
        self.batch_size > 1
    }

    /// Resolve the single and batch endpoints from the base URL.
    pub fn endpoints(&self) -> TraceEndpoints {
        TraceEndpoints::from_base_url(&self.base_url)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TraceError::Config("API key is required".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(TraceError::Config("Base URL cannot be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TraceError::Config(
                "Batch size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.batch_request_timeout.is_zero() {
            return Err(TraceError::Config(
                "Request timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&String> = self.headers.keys().collect();
        f.debug_struct("TraceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("batch_size", &self.batch_size)
            .field("batch_timeout", &self.batch_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("request_timeout", &self.request_timeout)
            .field("batch_request_timeout", &self.batch_request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("silent", &self.silent)
            .field("headers", &header_names)
            .finish()
    }
}

/// Fully-qualified trace endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEndpoints {
    pub trace: String,
    pub batch: String,
}

impl TraceEndpoints {
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            trace: format!("{}/api/traces", base),
            batch: format!("{}/api/traces/batch", base),
        }
    }
}
