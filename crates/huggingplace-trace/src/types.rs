//! Trace record data types.
//!
//! A [`TraceRecord`] is one timed observation of a traced operation. Records
//! that share a `trace_id` form one logical workflow; `parent_span_id` links a
//! record to the span that enclosed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TraceError;

/// Service name reported on every record.
pub const SERVICE_NAME: &str = "huggingplace-sdk";

/// Parent span id used for records that have no enclosing span.
pub const ROOT_PARENT_SPAN_ID: &str = "root";

/// Free-form key-value bag used for attributes, logs, and metadata.
pub type Fields = Map<String, Value>;

/// Generate a unique id for traces and spans.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Outcome of a traced operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    #[default]
    Ok,
    Error,
}

/// OpenTelemetry-style correlation ids mirrored from the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtelContext {
    pub otel_trace_id: String,
    pub otel_span_id: String,
}

/// One observation of a traced operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    /// Correlation id shared by all records in one workflow.
    pub trace_id: String,

    /// Unique id of this record.
    pub span_id: String,

    /// Id of the enclosing record, or [`ROOT_PARENT_SPAN_ID`].
    pub parent_span_id: String,

    /// Human-readable name of the traced step.
    pub operation: String,

    #[serde(default = "default_service")]
    pub service: String,

    #[serde(default)]
    pub status: SpanStatus,

    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// `end_time - start_time` in whole milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(default)]
    pub attributes: Fields,

    #[serde(default)]
    pub logs: Fields,

    #[serde(default)]
    pub metadata: Fields,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otel_context: Option<OtelContext>,
}

fn default_service() -> String {
    SERVICE_NAME.to_string()
}

impl TraceRecord {
    /// Start a new record for `operation` with a fresh span id.
    pub fn new(
        trace_id: impl Into<String>,
        parent_span_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        let trace_id = trace_id.into();
        let span_id = generate_id();
        Self {
            otel_context: Some(OtelContext {
                otel_trace_id: trace_id.clone(),
                otel_span_id: span_id.clone(),
            }),
            trace_id,
            span_id,
            parent_span_id: parent_span_id.into(),
            operation: operation.into(),
            service: SERVICE_NAME.to_string(),
            status: SpanStatus::Ok,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            attributes: Fields::new(),
            logs: Fields::new(),
            metadata: Fields::new(),
        }
    }

    /// Start a root record in a brand new trace.
    pub fn new_root(operation: impl Into<String>) -> Self {
        Self::new(generate_id(), ROOT_PARENT_SPAN_ID, operation)
    }

    pub fn with_attributes(mut self, attributes: Fields) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_logs(mut self, logs: Fields) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_metadata(mut self, metadata: Fields) -> Self {
        self.metadata = metadata;
        self
    }

    /// Close the record at the current time with the given status.
    pub fn finish(&mut self, status: SpanStatus) {
        self.finish_at(Utc::now(), status);
    }

    /// Close the record at `end_time`. Durations never go negative.
    pub fn finish_at(&mut self, end_time: DateTime<Utc>, status: SpanStatus) {
        self.end_time = Some(end_time);
        self.duration_ms = Some((end_time - self.start_time).num_milliseconds().max(0));
        self.status = status;
    }

    /// Check the fields a record must carry before it may be queued.
    pub fn validate(&self) -> Result<(), TraceError> {
        let missing: Vec<&str> = [
            ("traceId", self.trace_id.as_str()),
            ("spanId", self.span_id.as_str()),
            ("operation", self.operation.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TraceError::InvalidRecord(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}
