//! End-to-end tests for the log path over real HTTP.

use std::time::Duration;

use huggingplace::{
    ConfigUpdate, HuggingPlace, HuggingPlaceConfig, HuggingPlaceError, LogEntry, Mode,
    SessionOptions, StepLog, TimedLogError,
};
use huggingplace_tests::{MockHuggingPlace, Route};
use serde_json::{Value, json};

fn client_for(server: &MockHuggingPlace) -> HuggingPlace {
    HuggingPlace::new(
        HuggingPlaceConfig::new("hp_test_key", "org-42")
            .with_base_url(server.url())
            .with_mode(Mode::Dev)
            .with_timeout(Duration::from_secs(2))
            .with_silent(true),
    )
    .unwrap()
}

fn fields(value: Value) -> huggingplace::trace::Fields {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn log_attaches_account_context_and_bearer_token() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    let receipt = client
        .log(LogEntry::new("What is Rust?", "A language").with_llm_model("gpt-4o"))
        .await
        .unwrap();
    assert_eq!(receipt.message, "Response stored successfully");

    let requests = server.requests_to(Route::Log);
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer hp_test_key"));
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    assert_eq!(request.body["org_id"], "org-42");
    assert_eq!(request.body["mode"], "dev");
    assert_eq!(request.body["user_prompt"], "What is Rust?");
    assert_eq!(request.body["ai_response"], "A language");
    assert_eq!(request.body["llm_model"], "gpt-4o");

    server.shutdown().await;
}

#[tokio::test]
async fn log_401_is_authentication_error_without_retry() {
    let server = MockHuggingPlace::start().await;
    server.respond_always(Route::Log, 401, json!({"message": "Invalid API key"}));
    let client = client_for(&server);

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    match err {
        HuggingPlaceError::Authentication(message) => assert_eq!(message, "Invalid API key"),
        other => panic!("expected authentication error, got {:?}", other),
    }
    assert_eq!(server.request_count(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn log_maps_error_statuses() {
    let server = MockHuggingPlace::start().await;
    server.queue_response(Route::Log, 400, json!({"error": "bad field"}));
    server.queue_response(Route::Log, 429, json!({"message": "slow down"}));
    server.queue_response(Route::Log, 503, json!({}));
    server.queue_response(Route::Log, 404, json!({"message": "missing"}));
    let client = client_for(&server);

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Validation(ref m) if m == "bad field"));

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::RateLimit(_)));

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    assert!(matches!(
        err,
        HuggingPlaceError::Server { status: 503, ref message } if message == "Unknown error"
    ));

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Api { status: 404, .. }));

    assert_eq!(server.request_count(), 4);
    server.shutdown().await;
}

#[tokio::test]
async fn log_201_is_not_success() {
    let server = MockHuggingPlace::start().await;
    server.queue_response(Route::Log, 201, json!({"message": "created"}));
    let client = client_for(&server);

    let err = client.log(LogEntry::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Api { status: 201, .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn log_json_normalizes_aliases() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    client
        .log_json(json!({
            "userPrompt": "hello",
            "response": "hi there",
            "metadata": {"source": "cli"},
            "user_metadata": {"plan": "pro"},
            "tokenCount": 12,
            "campaign": "spring"
        }))
        .await
        .unwrap();

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["user_prompt"], "hello");
    assert_eq!(body["ai_response"], "hi there");
    assert_eq!(body["metaData"]["source"], "cli");
    assert_eq!(body["user_meta_data"]["plan"], "pro");
    assert_eq!(body["token_count"], 12);
    assert_eq!(body["campaign"], "spring");
    assert!(body.get("response").is_none());
    assert!(body.get("userPrompt").is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn log_json_sends_loosely_typed_values_as_given() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    client
        .log_json(json!({"user_prompt": 42, "sessionId": 12345, "metaData": null}))
        .await
        .unwrap();

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["user_prompt"], 42);
    assert_eq!(body["session_id"], 12345);
    assert!(body.get("metaData").is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn invalid_log_is_rejected_before_sending() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    let err = client.log_json(json!({"token_count": -5})).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Validation(_)));
    let err = client.log_json(json!({})).await.unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Validation(_)));
    assert_eq!(server.request_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn missing_api_key_fails_construction() {
    let err = HuggingPlace::new(HuggingPlaceConfig::new("", "org")).unwrap_err();
    assert!(matches!(err, HuggingPlaceError::Configuration(_)));
}

#[tokio::test]
async fn session_applies_defaults() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    let session = client.start_session(
        Some("session-9".to_string()),
        SessionOptions::new()
            .with_metadata(fields(json!({"channel": "web", "lang": "en"})))
            .with_user_metadata(fields(json!({"tier": "gold"}))),
    );
    session
        .log(LogEntry::new("q", "a").with_metadata(fields(json!({"lang": "fr"}))))
        .await
        .unwrap();

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["session_id"], "session-9");
    assert_eq!(body["metaData"], json!({"channel": "web", "lang": "fr"}));
    assert_eq!(body["user_meta_data"], json!({"tier": "gold"}));

    server.shutdown().await;
}

#[tokio::test]
async fn log_step_sends_single_step() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    client
        .log_step(
            StepLog::new("rerank")
                .with_status("success")
                .with_exchange("rank these", "ranked")
                .with_tokens(30, 5),
        )
        .await
        .unwrap();

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["user_prompt"], "rank these");
    assert_eq!(body["ai_response"], "ranked");
    assert_eq!(body["token_count"], 35);
    assert_eq!(body["step_data"][0]["step_name"], "rerank");
    assert_eq!(body["step_data"][0]["status"], "success");

    server.shutdown().await;
}

#[tokio::test]
async fn log_with_timing_records_response_time() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    let answer = client
        .log_with_timing(
            "summarize",
            || async { Ok::<_, String>("summary".to_string()) },
            LogEntry::default().with_session_id("s-1"),
        )
        .await
        .unwrap();
    assert_eq!(answer, "summary");

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["user_prompt"], "summarize");
    assert_eq!(body["ai_response"], "summary");
    assert_eq!(body["session_id"], "s-1");
    let response_time = body["response_time"].as_str().unwrap();
    assert!(response_time.starts_with("0 min "));
    assert!(response_time.ends_with(" sec"));

    server.shutdown().await;
}

#[tokio::test]
async fn log_with_timing_logs_generator_failure() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    let result = client
        .log_with_timing(
            "summarize",
            || async { Err::<String, _>("model offline".to_string()) },
            LogEntry::default().with_metadata(fields(json!({"run": 3}))),
        )
        .await;
    assert!(matches!(result, Err(TimedLogError::Generator(ref e)) if e == "model offline"));

    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["ai_response"], "Error: model offline");
    assert_eq!(body["metaData"]["error"], true);
    assert_eq!(body["metaData"]["error_message"], "model offline");
    assert_eq!(body["metaData"]["run"], 3);

    server.shutdown().await;
}

#[tokio::test]
async fn test_connection_reports_status() {
    let server = MockHuggingPlace::start().await;
    let client = client_for(&server);

    assert!(client.test_connection().await);
    let body = &server.requests_to(Route::Log)[0].body;
    assert_eq!(body["user_prompt"], "connection_test");
    assert_eq!(body["ai_response"], "test_response");

    server.respond_always(Route::Log, 500, json!({"error": "down"}));
    assert!(!client.test_connection().await);

    server.shutdown().await;
}

#[tokio::test]
async fn update_config_redirects_requests() {
    let first = MockHuggingPlace::start().await;
    let second = MockHuggingPlace::start().await;
    let mut client = client_for(&first);

    let before = client.get_config();
    client.update_config(ConfigUpdate::default()).unwrap();
    assert_eq!(client.get_config(), before);

    client
        .update_config(ConfigUpdate {
            base_url: Some(second.url()),
            api_key: Some("rotated".to_string()),
            ..ConfigUpdate::default()
        })
        .unwrap();
    client.log(LogEntry::new("q", "a")).await.unwrap();

    assert_eq!(first.request_count(), 0);
    let requests = second.requests_to(Route::Log);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer rotated"));

    first.shutdown().await;
    second.shutdown().await;
}
