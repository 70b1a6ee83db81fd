//! HuggingPlace client SDK.
//!
//! Logs LLM prompt/response interactions to HuggingPlace and ships execution
//! traces through [`huggingplace_trace`].
//!
//! - [`HuggingPlace`]: the client; `log`, `log_step`, `log_with_timing`,
//!   `test_connection`, and configuration management
//! - [`LogEntry`]: the canonical log payload, with alias normalization for
//!   loosely-shaped JSON input
//! - [`Session`]: tags a series of logs with one session id and default
//!   metadata
//!
//! # Usage
//!
//! ```rust,no_run
//! use huggingplace::{HuggingPlace, HuggingPlaceConfig, LogEntry};
//!
//! #[tokio::main]
//! async fn main() -> huggingplace::Result<()> {
//!     let client = HuggingPlace::new(HuggingPlaceConfig::new("hp_api_key", "org-123"))?;
//!
//!     client
//!         .log(LogEntry::new("What is Rust?", "A systems language").with_llm_model("gpt-4o"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod session;

// Re-export main types
pub use client::{HuggingPlace, LOG_PATH, LogReceipt, format_response_time};
pub use config::{ConfigUpdate, DEFAULT_TIMEOUT, HuggingPlaceConfig, Mode, PublicConfig};
pub use error::{HuggingPlaceError, Result, TimedLogError};
pub use payload::{FIELD_ALIASES, LogEntry, StepLog, normalize_fields};
pub use session::{Session, SessionInfo, SessionOptions};

pub use huggingplace_trace as trace;
