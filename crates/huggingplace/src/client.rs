//! HuggingPlace API client.
//!
//! [`HuggingPlace`] posts log entries to the log endpoint and hands out trace
//! senders configured from the same account settings. Logging errors are
//! always returned to the caller; nothing on the log path is retried.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use huggingplace_trace::{TraceSender, merge_layers};
use reqwest::{Client, Response, StatusCode, header};
use serde_json::Value;

use crate::config::{ConfigUpdate, HuggingPlaceConfig, PublicConfig};
use crate::error::{HuggingPlaceError, Result, TimedLogError};
use crate::payload::{LogEntry, StepLog};
use crate::session::{Session, SessionOptions};

/// Path of the log endpoint relative to the base URL.
pub const LOG_PATH: &str = "/v2/chatgpt/store_generated_response";

/// The only status the log endpoint reports success with.
pub const LOG_SUCCESS_STATUS: StatusCode = StatusCode::OK;

const DEFAULT_SUCCESS_MESSAGE: &str = "Successfully logged interaction";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Backend acknowledgement of a stored log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogReceipt {
    /// Backend message, or a default when the body carries none.
    pub message: String,
    /// Parsed response body; `Null` when the body is not JSON.
    pub body: Value,
}

/// Client for the HuggingPlace logging API.
#[derive(Debug)]
pub struct HuggingPlace {
    client: Client,
    config: HuggingPlaceConfig,
}

impl HuggingPlace {
    /// Create a client, failing fast on invalid configuration.
    pub fn new(config: HuggingPlaceConfig) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Create a client from `HUGGINGPLACE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(HuggingPlaceConfig::from_env()?)
    }

    /// The full configuration, credentials included.
    pub fn config(&self) -> &HuggingPlaceConfig {
        &self.config
    }

    /// The configuration without the API key.
    pub fn get_config(&self) -> PublicConfig {
        self.config.public()
    }

    /// Merge `update` into the current configuration.
    ///
    /// The merged result is validated first; on error the current
    /// configuration stays in place.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<()> {
        let next = self.config.merged(update);
        if next == self.config {
            return Ok(());
        }
        next.validate()?;
        let client = build_http_client(&next)?;

        self.client = client;
        self.config = next;
        if !self.config.silent {
            tracing::debug!(
                org_id = %self.config.org_id,
                base_url = %self.config.base_url,
                "Updated HuggingPlace configuration"
            );
        }
        Ok(())
    }

    /// A trace sender using this client's account and trace settings.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn trace_sender(&self) -> Result<TraceSender> {
        Ok(TraceSender::new(self.config.to_trace_config())?)
    }

    /// Build the log endpoint URL.
    fn log_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), LOG_PATH)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
    }

    async fn post_log(&self, body: &Value) -> Result<Response> {
        tracing::debug!(url = %self.log_url(), "Sending HuggingPlace log");
        let response = self
            .add_headers(self.client.post(self.log_url()))
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Log one interaction.
    pub async fn log(&self, entry: LogEntry) -> Result<LogReceipt> {
        let result = self.send_log(entry).await;
        if let Err(ref e) = result {
            if !self.config.silent {
                tracing::error!(error = %e, "Failed to log interaction to HuggingPlace");
            }
        }
        result
    }

    /// Log a loosely-shaped JSON payload. Field aliases are normalized first.
    pub async fn log_json(&self, value: Value) -> Result<LogReceipt> {
        self.log(LogEntry::from_json(value)?).await
    }

    async fn send_log(&self, entry: LogEntry) -> Result<LogReceipt> {
        entry.validate()?;
        let body = entry.to_payload(&self.config.org_id, self.config.mode)?;

        let response = self.post_log(&body).await?;
        let status = response.status();
        if status != LOG_SUCCESS_STATUS {
            return Err(Self::handle_error_response(response).await);
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SUCCESS_MESSAGE)
            .to_string();

        if !self.config.silent {
            tracing::info!(status = status.as_u16(), message = %message, "Logged interaction to HuggingPlace");
        }
        Ok(LogReceipt { message, body })
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> HuggingPlaceError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<Value>(&text) {
            Ok(body) => ["message", "error"]
                .iter()
                .find_map(|key| {
                    body.get(*key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            Err(_) if !text.trim().is_empty() => text,
            Err(_) => UNKNOWN_ERROR.to_string(),
        };

        HuggingPlaceError::from_status(status, message)
    }

    /// Log a single processing step as its own minimal entry.
    pub async fn log_step(&self, step: StepLog) -> Result<LogReceipt> {
        self.log(step.into_entry()?).await
    }

    /// Start a session that tags every entry with `session_id` (generated
    /// when absent) and applies default metadata.
    pub fn start_session(
        &self,
        session_id: Option<String>,
        options: SessionOptions,
    ) -> Session<'_> {
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Session::new(self, session_id, options)
    }

    /// Time `generator` and log its response.
    ///
    /// Fields set in `options` take precedence over the generated
    /// `user_prompt`, `ai_response` and `response_time`. If the generator
    /// fails, an error entry is logged and the generator's error returned.
    pub async fn log_with_timing<F, Fut, E>(
        &self,
        user_prompt: impl Into<String>,
        generator: F,
        options: LogEntry,
    ) -> std::result::Result<String, TimedLogError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
        E: Display,
    {
        let user_prompt = user_prompt.into();
        let started = Instant::now();

        match generator().await {
            Ok(response) => {
                let mut entry = options;
                entry.user_prompt.get_or_insert(Value::String(user_prompt));
                entry
                    .ai_response
                    .get_or_insert_with(|| Value::String(response.clone()));
                entry
                    .response_time
                    .get_or_insert_with(|| Value::String(format_response_time(started.elapsed())));

                self.log(entry).await?;
                Ok(response)
            }
            Err(error) => {
                let message = error.to_string();
                let mut entry = options;
                entry.user_prompt.get_or_insert(Value::String(user_prompt));
                entry
                    .ai_response
                    .get_or_insert_with(|| Value::String(format!("Error: {}", message)));
                entry
                    .response_time
                    .get_or_insert_with(|| Value::String(format_response_time(started.elapsed())));

                let mut error_fields = huggingplace_trace::Fields::new();
                error_fields.insert("error".to_string(), Value::Bool(true));
                error_fields.insert("error_message".to_string(), Value::String(message));
                entry.meta_data = merge_layers([&entry.meta_data, &error_fields]);

                if let Err(log_error) = self.log(entry).await {
                    if !self.config.silent {
                        tracing::warn!(error = %log_error, "Could not log generator failure");
                    }
                }
                Err(TimedLogError::Generator(error))
            }
        }
    }

    /// Post a minimal `connection_test` entry. True iff the backend answers 200.
    pub async fn test_connection(&self) -> bool {
        let entry = LogEntry::new("connection_test", "test_response");
        let outcome = match entry.to_payload(&self.config.org_id, self.config.mode) {
            Ok(body) => self.post_log(&body).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => response.status() == LOG_SUCCESS_STATUS,
            Err(e) => {
                if !self.config.silent {
                    tracing::warn!(error = %e, "HuggingPlace connection test failed");
                }
                false
            }
        }
    }
}

fn build_http_client(config: &HuggingPlaceConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| HuggingPlaceError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Format an elapsed time the way the backend displays it.
pub fn format_response_time(elapsed: Duration) -> String {
    format!("0 min {:.2} sec", elapsed.as_secs_f64())
}
