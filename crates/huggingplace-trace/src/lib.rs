//! Execution tracing for HuggingPlace.
//!
//! This crate records traced operations and ships them to the HuggingPlace
//! trace endpoints:
//!
//! - **Types**: [`TraceRecord`], one timed span with free-form attributes, logs,
//!   and metadata
//! - **Sender**: [`TraceSender`] buffers records and flushes them by size or
//!   idle timeout, delivering with bounded exponential backoff
//! - **Wrappers**: [`trace_step`], [`trace_llm`], and [`trace_flow`] time caller
//!   code and submit a record for each step
//!
//! Tracing is best-effort. Transport failures are logged and dropped; they
//! never reach the code being traced.
//!
//! # Usage
//!
//! ```rust,no_run
//! use huggingplace_trace::{StepOptions, TraceConfig, TraceSender, trace_step};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sender = TraceSender::new(TraceConfig::new("hp_api_key"))?;
//!
//!     let answer: Result<String, std::io::Error> = trace_step(
//!         Some(&sender),
//!         StepOptions::new("generate_answer"),
//!         || async { Ok("42".to_string()) },
//!     )
//!     .await;
//!
//!     sender.shutdown().await;
//!     println!("{}", answer?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod flow;
pub mod llm;
pub mod merge;
pub mod retry;
pub mod sender;
pub mod step;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_BATCH_REQUEST_TIMEOUT, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY, TraceConfig,
    TraceEndpoints,
};
pub use error::{Result, TraceError, TransportError};
pub use flow::{FlowError, FlowOptions, FlowStep, StepError, trace_flow};
pub use llm::{LlmCall, LlmMetadata, trace_llm};
pub use merge::{FieldsBuilder, merge_layers, to_fields};
pub use retry::{Delivery, DeliveryState, RetryPolicy, deliver_with_backoff};
pub use sender::{SenderStats, StatsSnapshot, TraceSender};
pub use step::{StepOptions, trace_step};
pub use transport::{HttpTransport, SharedTransport, TRACE_SUCCESS_STATUS, TraceTransport};
pub use types::{
    Fields, OtelContext, ROOT_PARENT_SPAN_ID, SERVICE_NAME, SpanStatus, TraceRecord, generate_id,
};
