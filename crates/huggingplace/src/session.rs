//! Sessions group related interactions under one `session_id`.

use huggingplace_trace::{Fields, merge_layers};
use serde::Serialize;
use serde_json::Value;

use crate::client::{HuggingPlace, LogReceipt};
use crate::error::Result;
use crate::payload::{LogEntry, StepLog};

/// Defaults applied to every entry logged through a [`Session`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    /// Default `metaData`.
    pub metadata: Fields,
    /// Default `user_meta_data`.
    pub user_metadata: Fields,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Fields) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_metadata(mut self, metadata: Fields) -> Self {
        self.user_metadata = metadata;
        self
    }
}

/// Snapshot of a session's id and defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub default_metadata: Fields,
    pub default_user_metadata: Fields,
}

/// A logging session bound to a client.
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a HuggingPlace,
    session_id: String,
    default_metadata: Fields,
    default_user_metadata: Fields,
}

impl<'a> Session<'a> {
    pub(crate) fn new(client: &'a HuggingPlace, session_id: String, options: SessionOptions) -> Self {
        Self {
            client,
            session_id,
            default_metadata: options.metadata,
            default_user_metadata: options.user_metadata,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fill in the session id and layer the entry's metadata over the defaults.
    pub fn apply_defaults(&self, mut entry: LogEntry) -> LogEntry {
        let missing = entry
            .session_id
            .as_ref()
            .is_none_or(|id| id.is_null() || id.as_str() == Some(""));
        if missing {
            entry.session_id = Some(Value::String(self.session_id.clone()));
        }
        entry.meta_data = merge_layers([&self.default_metadata, &entry.meta_data]);
        entry.user_meta_data = merge_layers([&self.default_user_metadata, &entry.user_meta_data]);
        entry
    }

    /// Log an interaction with the session defaults applied.
    pub async fn log(&self, entry: LogEntry) -> Result<LogReceipt> {
        self.client.log(self.apply_defaults(entry)).await
    }

    /// Log a loosely-shaped JSON payload with the session defaults applied.
    pub async fn log_json(&self, value: Value) -> Result<LogReceipt> {
        self.log(LogEntry::from_json(value)?).await
    }

    /// Log a processing step. Steps are logged as-is, without session defaults.
    pub async fn log_step(&self, step: StepLog) -> Result<LogReceipt> {
        self.client.log_step(step).await
    }

    /// Merge new defaults over the current ones.
    pub fn update_defaults(&mut self, metadata: Option<Fields>, user_metadata: Option<Fields>) {
        if let Some(metadata) = metadata {
            self.default_metadata = merge_layers([&self.default_metadata, &metadata]);
        }
        if let Some(user_metadata) = user_metadata {
            self.default_user_metadata =
                merge_layers([&self.default_user_metadata, &user_metadata]);
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            default_metadata: self.default_metadata.clone(),
            default_user_metadata: self.default_user_metadata.clone(),
        }
    }
}
