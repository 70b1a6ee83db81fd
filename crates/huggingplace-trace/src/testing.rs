//! In-process transport for sender tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::transport::TraceTransport;
use crate::types::TraceRecord;

/// One captured transport call.
#[derive(Debug, Clone)]
pub enum TransportCall {
    Single(TraceRecord),
    Batch(Vec<TraceRecord>),
}

/// Captures every call and answers with success or a fixed failure status.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_status: Option<u16>,
    latency: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every attempt fails with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every record seen so far, across single and batch calls.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.calls()
            .into_iter()
            .flat_map(|call| match call {
                TransportCall::Single(r) => vec![r],
                TransportCall::Batch(b) => b,
            })
            .collect()
    }

    async fn answer(&self, call: TransportCall, body: Value) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.fail_status {
            Some(status) => Err(TransportError::Status {
                status,
                body: String::new(),
            }),
            None => Ok(body),
        }
    }
}

#[async_trait]
impl TraceTransport for RecordingTransport {
    async fn send_trace(&self, record: &TraceRecord) -> Result<Value, TransportError> {
        let body = json!({"traceId": record.trace_id});
        self.answer(TransportCall::Single(record.clone()), body).await
    }

    async fn send_batch(&self, records: &[TraceRecord]) -> Result<Value, TransportError> {
        let body = json!({"count": records.len()});
        self.answer(TransportCall::Batch(records.to_vec()), body).await
    }
}

/// A valid root record for `operation`.
pub fn record(operation: &str) -> TraceRecord {
    TraceRecord::new_root(operation)
}
