//! LLM-specific step tracing.
//!
//! Wraps [`trace_step`](crate::step::trace_step) and adds the model
//! parameters as `llm.*` attributes and the prompt/messages as `llm.*` logs.
//! Caller-supplied attributes and logs take precedence over the generated
//! ones.

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::{FieldsBuilder, to_fields};
use crate::sender::TraceSender;
use crate::step::{StepOptions, trace_step};

/// Model and sampling parameters of an LLM call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

impl LlmMetadata {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sampling parameters in the snake_case shape logged under `llm.parameters`.
    fn parameters(&self) -> Value {
        Value::Object(
            FieldsBuilder::new()
                .insert_opt("temperature", self.temperature)
                .insert_opt("max_tokens", self.max_tokens)
                .insert_opt("top_p", self.top_p)
                .insert_opt("frequency_penalty", self.frequency_penalty)
                .insert_opt("presence_penalty", self.presence_penalty)
                .build(),
        )
    }
}

/// A traced LLM call: step context plus model details and inputs.
#[derive(Debug, Clone, Default)]
pub struct LlmCall {
    pub step: StepOptions,
    pub llm: LlmMetadata,
    pub prompt: Option<String>,
    pub messages: Option<Value>,
}

impl LlmCall {
    pub fn new(step: StepOptions, llm: LlmMetadata) -> Self {
        Self {
            step,
            llm,
            prompt: None,
            messages: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_messages(mut self, messages: Value) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Fold the LLM details into plain step options.
    fn into_step_options(self) -> StepOptions {
        let LlmCall {
            mut step,
            llm,
            prompt,
            messages,
        } = self;

        step.attributes = FieldsBuilder::new()
            .insert_opt("llm.provider", llm.provider.clone())
            .insert_opt("llm.model", llm.model.clone())
            .insert_opt("llm.temperature", llm.temperature)
            .insert_opt("llm.max_tokens", llm.max_tokens)
            .insert_opt("llm.top_p", llm.top_p)
            .insert_opt("llm.frequency_penalty", llm.frequency_penalty)
            .insert_opt("llm.presence_penalty", llm.presence_penalty)
            .layer(&step.attributes)
            .build();

        step.logs = FieldsBuilder::new()
            .insert_opt("llm.prompt", prompt)
            .insert_opt("llm.messages", messages)
            .insert("llm.parameters", llm.parameters())
            .layer(&step.logs)
            .build();

        step.custom_metadata = FieldsBuilder::new()
            .insert("llmData", Value::Object(to_fields(&llm)))
            .layer(&step.custom_metadata)
            .build();

        step
    }
}

/// Run `f` as a traced LLM call.
pub async fn trace_llm<F, Fut, T, E>(
    sender: Option<&TraceSender>,
    call: LlmCall,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Serialize,
    E: Display,
{
    trace_step(sender, call.into_step_options(), f).await
}
