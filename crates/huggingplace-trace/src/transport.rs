//! Network transport for trace records.
//!
//! The [`TraceTransport`] trait is the seam between the batching sender and
//! the wire. [`HttpTransport`] posts JSON to the HuggingPlace trace endpoints;
//! tests substitute an in-process implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde_json::Value;

use crate::config::{TraceConfig, TraceEndpoints};
use crate::error::{Result, TraceError, TransportError};
use crate::types::TraceRecord;

/// Status the trace endpoints answer with on success.
pub const TRACE_SUCCESS_STATUS: StatusCode = StatusCode::CREATED;

/// One attempt at delivering records. Implementations do not retry.
#[async_trait]
pub trait TraceTransport: Send + Sync {
    /// POST one record to the single-trace endpoint.
    async fn send_trace(&self, record: &TraceRecord) -> std::result::Result<Value, TransportError>;

    /// POST a batch of records to the batch endpoint.
    async fn send_batch(
        &self,
        records: &[TraceRecord],
    ) -> std::result::Result<Value, TransportError>;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn TraceTransport>;

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
    endpoints: TraceEndpoints,
    api_key: String,
    extra_headers: Vec<(String, String)>,
    request_timeout: Duration,
    batch_request_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from the trace configuration.
    pub fn new(config: &TraceConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| TraceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: config.endpoints(),
            api_key: config.api_key.clone(),
            extra_headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            request_timeout: config.request_timeout,
            batch_request_timeout: config.batch_request_timeout,
        })
    }

    pub fn endpoints(&self) -> &TraceEndpoints {
        &self.endpoints
    }

    /// Add authentication and content headers to a request.
    fn add_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json");

        self.extra_headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()))
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        timeout: Duration,
    ) -> std::result::Result<Value, TransportError> {
        let body = serde_json::to_vec(body)?;
        let response = self
            .add_headers(self.client.post(url))
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Anything but 201 is a failed attempt. A 201 with an unreadable body
    /// still counts as delivered.
    async fn handle_response(response: Response) -> std::result::Result<Value, TransportError> {
        let status = response.status();
        let body = response.text().await?;

        if status != TRACE_SUCCESS_STATUS {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl TraceTransport for HttpTransport {
    async fn send_trace(&self, record: &TraceRecord) -> std::result::Result<Value, TransportError> {
        tracing::debug!(
            url = %self.endpoints.trace,
            trace_id = %record.trace_id,
            span_id = %record.span_id,
            "Posting trace"
        );
        self.post(&self.endpoints.trace, record, self.request_timeout)
            .await
    }

    async fn send_batch(
        &self,
        records: &[TraceRecord],
    ) -> std::result::Result<Value, TransportError> {
        tracing::debug!(
            url = %self.endpoints.batch,
            records = records.len(),
            "Posting trace batch"
        );
        self.post(&self.endpoints.batch, records, self.batch_request_timeout)
            .await
    }
}
