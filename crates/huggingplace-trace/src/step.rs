//! Tracing wrapper for a single workflow step.
//!
//! [`trace_step`] times a fallible future, records the outcome as a
//! [`TraceRecord`], and hands it to the sender. The wrapped function's result
//! is returned unchanged: tracing failures are logged and swallowed, and the
//! function's own error is passed back to the caller after being recorded
//! with `status = ERROR`.

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::merge::FieldsBuilder;
use crate::sender::TraceSender;
use crate::types::{Fields, ROOT_PARENT_SPAN_ID, SpanStatus, TraceRecord, generate_id};

/// Caller-supplied context for one traced step.
#[derive(Debug, Clone, Default)]
pub struct StepOptions {
    pub step_name: String,
    /// Trace to join; a new one is started when absent.
    pub trace_id: Option<String>,
    /// Enclosing span; [`ROOT_PARENT_SPAN_ID`] when absent.
    pub parent_span_id: Option<String>,
    pub user_metadata: Fields,
    pub org_data: Fields,
    pub custom_metadata: Fields,
    pub logs: Fields,
    pub attributes: Fields,
    pub tags: Vec<String>,
    pub priority: Option<String>,
}

impl StepOptions {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            ..Self::default()
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_parent_span_id(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn with_user_metadata(mut self, metadata: Fields) -> Self {
        self.user_metadata = metadata;
        self
    }

    pub fn with_org_data(mut self, org_data: Fields) -> Self {
        self.org_data = org_data;
        self
    }

    pub fn with_custom_metadata(mut self, metadata: Fields) -> Self {
        self.custom_metadata = metadata;
        self
    }

    pub fn with_logs(mut self, logs: Fields) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_attributes(mut self, attributes: Fields) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Open a record for this step with its metadata filled in.
    fn start_record(&self) -> TraceRecord {
        let trace_id = self.trace_id.clone().unwrap_or_else(generate_id);
        let parent_span_id = self
            .parent_span_id
            .clone()
            .unwrap_or_else(|| ROOT_PARENT_SPAN_ID.to_string());

        let record = TraceRecord::new(trace_id, parent_span_id, self.step_name.clone());
        let metadata = FieldsBuilder::new()
            .insert("userMetadata", Value::Object(self.user_metadata.clone()))
            .insert("orgData", Value::Object(self.org_data.clone()))
            .insert("customMetadata", Value::Object(self.custom_metadata.clone()))
            .insert("tags", self.tags.clone())
            .insert("priority", self.priority.clone())
            .insert("stepName", self.step_name.clone())
            .insert("traceId", record.trace_id.clone())
            .insert("parentSpanId", record.parent_span_id.clone())
            .insert("spanId", record.span_id.clone())
            .build();

        record
            .with_attributes(self.attributes.clone())
            .with_logs(self.logs.clone())
            .with_metadata(metadata)
    }
}

/// Run `f` as a traced step.
///
/// When `sender` is `None` the step still runs and is timed, but nothing is
/// submitted.
pub async fn trace_step<F, Fut, T, E>(
    sender: Option<&TraceSender>,
    options: StepOptions,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: Display,
{
    run_traced(sender, &options, f, |_| short_type_name::<E>()).await
}

/// Shared body of the step wrappers; `error_type` names a failure in the
/// record's logs.
pub(crate) async fn run_traced<F, Fut, T, E>(
    sender: Option<&TraceSender>,
    options: &StepOptions,
    f: F,
    error_type: impl FnOnce(&E) -> String,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: Display,
{
    let mut record = options.start_record();
    let result = f().await;

    match &result {
        Ok(value) => {
            record.logs = FieldsBuilder::new()
                .layer(&options.logs)
                .insert(
                    "functionResponse",
                    serde_json::to_value(value).unwrap_or(Value::Null),
                )
                .insert("success", true)
                .build();
            record.finish(SpanStatus::Ok);
        }
        Err(e) => {
            record.logs = FieldsBuilder::new()
                .layer(&options.logs)
                .insert("error", e.to_string())
                .insert("errorType", error_type(e))
                .insert("success", false)
                .build();
            record.finish(SpanStatus::Error);
        }
    }

    if let Some(sender) = sender {
        if let Err(e) = sender.submit(record) {
            tracing::warn!(step = %options.step_name, error = %e, "Trace for step was not queued");
        }
    }

    result
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
