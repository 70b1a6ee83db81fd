//! Log payload normalization.
//!
//! Callers send log entries in several historical shapes (`userPrompt` vs
//! `user_prompt`, `metadata` vs `metaData`, ...). Everything is mapped once,
//! at the boundary, onto the canonical [`LogEntry`] through [`FIELD_ALIASES`].
//! The canonical name wins when both it and an alias are present; among
//! aliases the first listed wins. Unrecognized fields pass through untouched.

use huggingplace_trace::Fields;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::config::Mode;
use crate::error::{HuggingPlaceError, Result};

/// Canonical field name and the external aliases accepted for it.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("user_prompt", &["userPrompt", "prompt"]),
    ("ai_response", &["aiResponse", "response"]),
    ("user_uuid", &["userUuid"]),
    ("file_name", &["fileName"]),
    ("session_id", &["sessionId"]),
    ("llm_model", &["llmModel", "model"]),
    ("llm_model2", &["llmModel2"]),
    ("token_count", &["tokenCount", "tokens"]),
    ("metaData", &["metadata", "meta_data"]),
    ("user_roles", &["userRoles"]),
    ("org_uuid", &["orgUuid"]),
    ("mapping_table", &["mappingTable"]),
    ("step_data", &["stepData", "steps"]),
    ("response_time", &["responseTime"]),
    ("message_id", &["messageId"]),
    ("user_meta_data", &["user_metadata", "userMetadata", "userMetaData"]),
];

/// Rename aliased keys to their canonical names.
pub fn normalize_fields(mut fields: Fields) -> Fields {
    for (canonical, aliases) in FIELD_ALIASES {
        let mut value = fields.remove(*canonical);
        for alias in *aliases {
            if let Some(aliased) = fields.remove(*alias) {
                value.get_or_insert(aliased);
            }
        }
        if let Some(value) = value {
            fields.insert((*canonical).to_string(), value);
        }
    }
    fields
}

/// One logged LLM interaction in the backend's schema.
///
/// Scalar fields hold any JSON value; only `token_count` is type-checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_uuid: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model2: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<Number>,
    #[serde(
        rename = "metaData",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Fields::is_empty"
    )]
    pub meta_data: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_roles: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_uuid: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_table: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_data: Option<Vec<Value>>,
    /// Free-form; the backend accepts any format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Value>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Fields::is_empty"
    )]
    pub user_meta_data: Fields,

    /// Unrecognized caller fields, sent as-is.
    #[serde(flatten)]
    pub extra: Fields,
}

impl LogEntry {
    pub fn new(user_prompt: impl Into<String>, ai_response: impl Into<String>) -> Self {
        Self {
            user_prompt: Some(Value::String(user_prompt.into())),
            ai_response: Some(Value::String(ai_response.into())),
            ..Self::default()
        }
    }

    /// Parse a loosely-shaped JSON payload.
    ///
    /// Aliases are normalized first; only value types are checked, no field
    /// is required.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(HuggingPlaceError::Validation(
                "Log options must be a JSON object".to_string(),
            ));
        };
        if fields.is_empty() {
            return Err(HuggingPlaceError::Validation(
                "Log options are required".to_string(),
            ));
        }

        let normalized = normalize_fields(fields);
        if let Some(token_count) = normalized.get("token_count") {
            check_token_count(token_count)?;
        }

        let entry: LogEntry = serde_json::from_value(Value::Object(normalized))
            .map_err(|e| HuggingPlaceError::Validation(format!("Invalid log options: {}", e)))?;
        Ok(entry)
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(Value::String(session_id.into()));
        self
    }

    pub fn with_user_uuid(mut self, user_uuid: impl Into<String>) -> Self {
        self.user_uuid = Some(Value::String(user_uuid.into()));
        self
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(Value::String(model.into()));
        self
    }

    pub fn with_token_count(mut self, tokens: u64) -> Self {
        self.token_count = Some(Number::from(tokens));
        self
    }

    pub fn with_response_time(mut self, response_time: impl Into<Value>) -> Self {
        self.response_time = Some(response_time.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Fields) -> Self {
        self.meta_data = metadata;
        self
    }

    pub fn with_user_metadata(mut self, metadata: Fields) -> Self {
        self.user_meta_data = metadata;
        self
    }

    pub fn with_step_data(mut self, steps: Vec<Value>) -> Self {
        self.step_data = Some(steps);
        self
    }

    /// Attach a field outside the canonical schema.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// True when no field at all is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Type checks applied to every outgoing entry.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(HuggingPlaceError::Validation(
                "Log options are required".to_string(),
            ));
        }
        if let Some(ref token_count) = self.token_count {
            check_token_count(&Value::Number(token_count.clone()))?;
        }
        Ok(())
    }

    /// The request body: this entry plus the account's `org_id` and `mode`.
    ///
    /// Account values replace any caller-supplied `org_id`/`mode`.
    pub fn to_payload(&self, org_id: &str, mode: Mode) -> Result<Value> {
        let mut body = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        };
        body.insert("org_id".to_string(), Value::String(org_id.to_string()));
        body.insert("mode".to_string(), Value::String(mode.to_string()));
        Ok(Value::Object(body))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Fields, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Fields>::deserialize(deserializer)?.unwrap_or_default())
}

fn check_token_count(value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v >= 0.0) => Ok(()),
        _ => Err(HuggingPlaceError::Validation(
            "Token count must be a non-negative number".to_string(),
        )),
    }
}

/// One processing step for [`HuggingPlace::log_step`](crate::HuggingPlace::log_step).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl StepLog {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: Some(step_name.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_exchange(
        mut self,
        user_question: impl Into<String>,
        prompt_response: impl Into<String>,
    ) -> Self {
        self.user_question = Some(user_question.into());
        self.prompt_response = Some(prompt_response.into());
        self
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self.token = Some(input.saturating_add(output));
        self
    }

    pub fn with_time_ms(mut self, time_ms: u64) -> Self {
        self.time_ms = Some(time_ms);
        self
    }

    /// A minimal log entry describing this step alone.
    pub fn into_entry(self) -> Result<LogEntry> {
        let step = serde_json::to_value(&self)?;
        Ok(LogEntry {
            user_prompt: Some(Value::String(self.user_question.unwrap_or_default())),
            ai_response: Some(Value::String(self.prompt_response.unwrap_or_default())),
            llm_model: self.llm_model.map(Value::String),
            token_count: self.token.map(Number::from),
            response_time: self.response_time,
            step_data: Some(vec![step]),
            ..LogEntry::default()
        })
    }
}
