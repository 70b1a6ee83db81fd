//! End-to-end tests for trace batching and delivery over real HTTP.

use std::time::{Duration, Instant};

use huggingplace::{HuggingPlace, HuggingPlaceConfig};
use huggingplace_tests::{MockHuggingPlace, Route};
use huggingplace_trace::{
    DeliveryState, FlowOptions, FlowStep, LlmCall, LlmMetadata, StepOptions, TraceConfig,
    TraceRecord, TraceSender, trace_flow, trace_llm, trace_step,
};
use serde_json::{Value, json};

fn trace_config(server: &MockHuggingPlace) -> TraceConfig {
    TraceConfig::new("hp_trace_key")
        .with_base_url(server.url())
        .with_retry_delay(Duration::from_millis(10))
        .with_silent(true)
}

#[tokio::test]
async fn full_batch_is_sent_once_in_order() {
    let server = MockHuggingPlace::start().await;
    let sender = TraceSender::new(trace_config(&server).with_batch_size(10)).unwrap();

    let operations: Vec<String> = (0..10).map(|i| format!("op-{}", i)).collect();
    for op in &operations {
        sender.submit(TraceRecord::new_root(op.clone())).unwrap();
    }
    let stats = sender.shutdown().await;
    assert_eq!(stats.delivered, 10);

    let batches = server.requests_to(Route::Batch);
    assert_eq!(batches.len(), 1);
    assert!(server.requests_to(Route::Trace).is_empty());

    let sent: Vec<&str> = batches[0]
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["operation"].as_str().unwrap())
        .collect();
    assert_eq!(sent, operations.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(
        batches[0].authorization.as_deref(),
        Some("Bearer hp_trace_key")
    );

    server.shutdown().await;
}

#[tokio::test]
async fn partial_batch_flushes_after_idle_timeout() {
    let server = MockHuggingPlace::start().await;
    let sender = TraceSender::new(
        trace_config(&server)
            .with_batch_size(10)
            .with_batch_timeout(Duration::from_millis(50)),
    )
    .unwrap();

    for op in ["a", "b", "c"] {
        sender.submit(TraceRecord::new_root(op)).unwrap();
    }
    assert_eq!(sender.pending(), 3);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sender.pending(), 0);

    let batches = server.requests_to(Route::Batch);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].body.as_array().unwrap().len(), 3);

    sender.shutdown().await;
    assert_eq!(server.requests_to(Route::Batch).len(), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn failing_backend_is_retried_then_dropped() {
    let server = MockHuggingPlace::start().await;
    server.respond_always(Route::Trace, 500, json!({"error": "boom"}));
    let sender = TraceSender::new(
        trace_config(&server)
            .with_batch_size(1)
            .with_max_retries(3),
    )
    .unwrap();

    let started = Instant::now();
    assert!(sender.submit(TraceRecord::new_root("unlucky")).is_ok());
    let stats = sender.shutdown().await;

    assert_eq!(server.requests_to(Route::Trace).len(), 4);
    assert_eq!(stats.attempts, 4);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.delivered, 0);
    // 10 + 20 + 40 ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(70));

    server.shutdown().await;
}

#[tokio::test]
async fn send_trace_with_retry_reports_terminal_state() {
    let server = MockHuggingPlace::start().await;
    server.queue_response(Route::Trace, 503, json!({}));
    let sender = TraceSender::new(trace_config(&server).with_batch_size(1)).unwrap();

    let delivery = sender
        .send_trace_with_retry(TraceRecord::new_root("second-time-lucky"))
        .await;
    assert_eq!(delivery.state(), DeliveryState::Succeeded);
    assert_eq!(delivery.attempts(), 2);
    assert!(delivery.response().unwrap().get("traceId").is_some());

    server.respond_always(Route::Batch, 429, json!({}));
    let delivery = sender
        .send_batch_with_retry(vec![TraceRecord::new_root("x")])
        .await;
    assert_eq!(delivery.state(), DeliveryState::Dropped);
    assert_eq!(delivery.attempts(), 4);

    server.shutdown().await;
}

#[tokio::test]
async fn unbatched_record_uses_single_endpoint() {
    let server = MockHuggingPlace::start().await;
    let sender = TraceSender::new(trace_config(&server).with_batch_size(1)).unwrap();

    let record = TraceRecord::new_root("solo");
    let trace_id = record.trace_id.clone();
    sender.submit(record).unwrap();
    sender.shutdown().await;

    let singles = server.requests_to(Route::Trace);
    assert_eq!(singles.len(), 1);
    assert!(server.requests_to(Route::Batch).is_empty());
    assert_eq!(singles[0].body["traceId"], Value::String(trace_id));
    assert_eq!(singles[0].body["service"], "huggingplace-sdk");

    server.shutdown().await;
}

#[tokio::test]
async fn invalid_record_never_reaches_backend() {
    let server = MockHuggingPlace::start().await;
    let sender = TraceSender::new(trace_config(&server).with_batch_size(1)).unwrap();

    assert!(sender.submit(TraceRecord::new_root("  ")).is_err());

    let stats = sender.shutdown().await;
    assert_eq!(stats.rejected, 1);
    assert_eq!(server.request_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn client_trace_sender_records_traced_steps() {
    let server = MockHuggingPlace::start().await;
    let client = HuggingPlace::new(
        HuggingPlaceConfig::new("hp_key", "org-1")
            .with_base_url(server.url())
            .with_trace_batch_size(1)
            .with_silent(true),
    )
    .unwrap();
    let sender = client.trace_sender().unwrap();

    let ok: Result<Value, String> = trace_step(
        Some(&sender),
        StepOptions::new("lookup").with_trace_id("trace-1"),
        || async { Ok(json!({"rows": 2})) },
    )
    .await;
    assert_eq!(ok.unwrap()["rows"], 2);

    let failed: Result<Value, String> = trace_llm(
        Some(&sender),
        LlmCall::new(
            StepOptions::new("generate").with_trace_id("trace-1"),
            LlmMetadata::new("openai", "gpt-4o").with_temperature(0.1),
        )
        .with_prompt("Write a haiku"),
        || async { Err("context too long".to_string()) },
    )
    .await;
    assert_eq!(failed.unwrap_err(), "context too long");

    sender.shutdown().await;

    let mut bodies: Vec<Value> = server
        .requests_to(Route::Trace)
        .into_iter()
        .map(|r| r.body)
        .collect();
    bodies.sort_by_key(|b| b["operation"].as_str().map(str::to_string));
    assert_eq!(bodies.len(), 2);

    let generate = &bodies[0];
    assert_eq!(generate["operation"], "generate");
    assert_eq!(generate["status"], "ERROR");
    assert_eq!(generate["logs"]["error"], "context too long");
    assert_eq!(generate["logs"]["success"], false);
    assert_eq!(generate["attributes"]["llm.model"], "gpt-4o");
    assert_eq!(generate["logs"]["llm.prompt"], "Write a haiku");

    let lookup = &bodies[1];
    assert_eq!(lookup["traceId"], "trace-1");
    assert_eq!(lookup["status"], "OK");
    assert_eq!(lookup["logs"]["functionResponse"], json!({"rows": 2}));
    assert!(lookup["durationMs"].as_i64().unwrap() >= 0);

    server.shutdown().await;
}

#[tokio::test]
async fn workflow_steps_share_one_trace() {
    let server = MockHuggingPlace::start().await;
    let sender = TraceSender::new(
        trace_config(&server)
            .with_batch_size(3)
            .with_batch_timeout(Duration::from_secs(5)),
    )
    .unwrap();

    let results = trace_flow(
        Some(&sender),
        FlowOptions::new("rag").with_trace_id("wf-1"),
        vec![
            FlowStep::new("retrieve", |_| async { Ok(json!(["doc1", "doc2"])) }),
            FlowStep::new("rank", |prev: Vec<Value>| async move { Ok(prev[0][0].clone()) }),
            FlowStep::new("answer", |prev: Vec<Value>| async move {
                Ok(json!(format!("based on {}", prev[1].as_str().unwrap_or(""))))
            }),
        ],
    )
    .await
    .unwrap();
    assert_eq!(results[2], Some(json!("based on doc1")));

    sender.shutdown().await;
    let batches = server.requests_to(Route::Batch);
    assert_eq!(batches.len(), 1);

    let records = batches[0].body.as_array().unwrap();
    let steps: Vec<&str> = records
        .iter()
        .map(|r| r["attributes"]["workflow.step_name"].as_str().unwrap())
        .collect();
    assert_eq!(steps, vec!["retrieve", "rank", "answer"]);
    for record in records {
        assert_eq!(record["traceId"], "wf-1");
        assert_eq!(record["parentSpanId"], "wf-1");
    }

    server.shutdown().await;
}
