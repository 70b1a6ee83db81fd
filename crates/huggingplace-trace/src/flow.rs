//! Multi-step workflow tracing.
//!
//! Steps run sequentially under one trace id. Every step record uses the
//! trace id as its parent span, carries `workflow.*` attributes and logs, and
//! receives the results of the steps before it.

use std::future::Future;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::merge::FieldsBuilder;
use crate::sender::TraceSender;
use crate::step::{StepOptions, run_traced};
use crate::types::{Fields, generate_id};

/// Error type returned by workflow steps.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

type StepFn = Box<dyn FnOnce(Vec<Value>) -> BoxFuture<'static, Result<Value, StepError>> + Send>;

/// One step of a workflow.
pub struct FlowStep {
    name: Option<String>,
    func: StepFn,
    attributes: Fields,
    logs: Fields,
    tags: Option<Vec<String>>,
    priority: Option<String>,
    continue_on_error: bool,
}

impl FlowStep {
    /// A step named `name` running `f` with the previous steps' results.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        Self {
            name: Some(name.into()),
            func: Box::new(move |previous| Box::pin(f(previous))),
            attributes: Fields::new(),
            logs: Fields::new(),
            tags: None,
            priority: None,
            continue_on_error: false,
        }
    }

    /// A step that takes its name from its position (`step_<index>`).
    pub fn unnamed<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        let mut step = Self::new(String::new(), f);
        step.name = None;
        step
    }

    pub fn with_attributes(mut self, attributes: Fields) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_logs(mut self, logs: Fields) -> Self {
        self.logs = logs;
        self
    }

    /// Override the workflow's tags for this step.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Override the workflow's priority for this step.
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Keep going with later steps if this one fails.
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("step_{}", index))
    }
}

/// Workflow-level context shared by every step.
#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    pub flow_name: String,
    pub trace_id: Option<String>,
    pub user_metadata: Fields,
    pub org_data: Fields,
    pub custom_metadata: Fields,
    pub logs: Fields,
    pub attributes: Fields,
    pub tags: Vec<String>,
    pub priority: Option<String>,
    /// Additional workflow-level metadata.
    pub extra: Fields,
}

impl FlowOptions {
    pub fn new(flow_name: impl Into<String>) -> Self {
        Self {
            flow_name: flow_name.into(),
            ..Self::default()
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
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

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_extra(mut self, extra: Fields) -> Self {
        self.extra = extra;
        self
    }
}

/// A step failed and was not marked `continue_on_error`.
#[derive(Debug, Error)]
#[error("Workflow step '{step}' (#{index}) failed: {source}")]
pub struct FlowError {
    pub step: String,
    pub index: usize,
    #[source]
    pub source: StepError,
}

/// Run `steps` in order under one trace.
///
/// Returns one entry per step: `Some(result)` on success, `None` for a failed
/// step that allowed the workflow to continue.
pub async fn trace_flow(
    sender: Option<&TraceSender>,
    options: FlowOptions,
    steps: Vec<FlowStep>,
) -> Result<Vec<Option<Value>>, FlowError> {
    let trace_id = options.trace_id.clone().unwrap_or_else(generate_id);
    let step_names: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| step.display_name(i))
        .collect();

    let flow_metadata = FieldsBuilder::new()
        .insert("userMetadata", Value::Object(options.user_metadata.clone()))
        .insert("orgData", Value::Object(options.org_data.clone()))
        .insert("customMetadata", Value::Object(options.custom_metadata.clone()))
        .insert("tags", options.tags.clone())
        .insert("priority", options.priority.clone())
        .insert("flowName", options.flow_name.clone())
        .insert("traceId", trace_id.clone())
        .layer(&options.extra)
        .build();

    let flow_attributes = FieldsBuilder::new()
        .insert("workflow.name", options.flow_name.clone())
        .insert("workflow.step_count", steps.len())
        .layer(&options.attributes)
        .build();

    let flow_logs = FieldsBuilder::new()
        .insert("workflow.steps", step_names.clone())
        .layer(&options.logs)
        .build();

    let mut results = Vec::with_capacity(steps.len());
    let mut previous: Vec<Value> = Vec::with_capacity(steps.len());

    for (index, (step, name)) in steps.into_iter().zip(step_names).enumerate() {
        let step_options = StepOptions {
            step_name: name.clone(),
            trace_id: Some(trace_id.clone()),
            parent_span_id: Some(trace_id.clone()),
            user_metadata: options.user_metadata.clone(),
            org_data: options.org_data.clone(),
            custom_metadata: FieldsBuilder::new()
                .layer(&flow_metadata)
                .insert("stepOrder", index)
                .insert("stepName", name.clone())
                .build(),
            logs: FieldsBuilder::new()
                .layer(&flow_logs)
                .insert("workflow.previous_results", previous.clone())
                .layer(&step.logs)
                .build(),
            attributes: FieldsBuilder::new()
                .layer(&flow_attributes)
                .insert("workflow.step_order", index)
                .insert("workflow.step_name", name.clone())
                .layer(&step.attributes)
                .build(),
            tags: step.tags.unwrap_or_else(|| options.tags.clone()),
            priority: step.priority.or_else(|| options.priority.clone()),
        };

        let func = step.func;
        let input = previous.clone();
        let outcome = run_traced(
            sender,
            &step_options,
            move || func(input),
            |_: &StepError| "StepError".to_string(),
        )
        .await;

        match outcome {
            Ok(value) => {
                previous.push(value.clone());
                results.push(Some(value));
            }
            Err(source) if step.continue_on_error => {
                tracing::warn!(step = %name, error = %source, "Workflow step failed, continuing");
                previous.push(serde_json::json!({ "error": source.to_string() }));
                results.push(None);
            }
            Err(source) => {
                return Err(FlowError {
                    step: name,
                    index,
                    source,
                });
            }
        }
    }

    Ok(results)
}
