//! HTTP mock of the HuggingPlace backend for end-to-end tests.
//!
//! Serves the log endpoint and both trace endpoints on a random local port,
//! captures every request, and answers with scripted or default responses.
//!
//! # Example
//!
//! ```ignore
//! use huggingplace_tests::{MockHuggingPlace, Route};
//!
//! let server = MockHuggingPlace::start().await;
//! server.respond_always(Route::Log, 401, json!({"message": "Invalid API key"}));
//!
//! // Point a client at server.url()
//!
//! server.shutdown().await;
//! ```

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Log endpoint path.
pub const LOG_PATH: &str = "/v2/chatgpt/store_generated_response";
/// Single trace endpoint path.
pub const TRACE_PATH: &str = "/api/traces";
/// Batch trace endpoint path.
pub const BATCH_PATH: &str = "/api/traces/batch";

/// Endpoint served by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Log,
    Trace,
    Batch,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Log => LOG_PATH,
            Route::Trace => TRACE_PATH,
            Route::Batch => BATCH_PATH,
        }
    }
}

/// One request received by the mock.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub route: Route,
    /// `Authorization` header value, if sent.
    pub authorization: Option<String>,
    /// `Content-Type` header value, if sent.
    pub content_type: Option<String>,
    /// Request body; `Null` if it was not JSON.
    pub body: Value,
}

#[derive(Debug, Default)]
struct MockState {
    requests: Mutex<Vec<CapturedRequest>>,
    /// One-shot responses, consumed in order.
    queued: Mutex<HashMap<Route, VecDeque<(u16, Value)>>>,
    /// Replaces the default response once the queue is empty.
    fixed: Mutex<HashMap<Route, (u16, Value)>>,
}

impl MockState {
    fn capture(&self, route: Route, headers: &HeaderMap, body: &Bytes) -> Value {
        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        self.requests.lock().unwrap().push(CapturedRequest {
            route,
            authorization: header_value(header::AUTHORIZATION),
            content_type: header_value(header::CONTENT_TYPE),
            body: body.clone(),
        });
        body
    }

    fn scripted(&self, route: Route) -> Option<(u16, Value)> {
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);
        queued.or_else(|| self.fixed.lock().unwrap().get(&route).cloned())
    }
}

/// An HTTP mock of the HuggingPlace API.
pub struct MockHuggingPlace {
    /// Server address.
    addr: SocketAddr,
    state: Arc<MockState>,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle.
    handle: Option<JoinHandle<()>>,
}

impl MockHuggingPlace {
    /// Start a new mock server on a random available port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route(LOG_PATH, post(handle_log))
            .route(TRACE_PATH, post(handle_trace))
            .route(BATCH_PATH, post(handle_batch))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Get the server's base URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer the next request on `route` with `status` and `body`.
    pub fn queue_response(&self, route: Route, status: u16, body: Value) {
        self.state
            .queued
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back((status, body));
    }

    /// Answer every request on `route` with `status` and `body`.
    pub fn respond_always(&self, route: Route, status: u16, body: Value) {
        self.state
            .fixed
            .lock()
            .unwrap()
            .insert(route, (status, body));
    }

    /// All captured requests, in arrival order.
    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Captured requests for one route.
    pub fn requests_to(&self, route: Route) -> Vec<CapturedRequest> {
        self.captured_requests()
            .into_iter()
            .filter(|r| r.route == route)
            .collect()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Shutdown the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn respond(status: u16, body: Value) -> axum::response::Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Handle POST /v2/chatgpt/store_generated_response
async fn handle_log(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.capture(Route::Log, &headers, &body);
    let (status, body) = state
        .scripted(Route::Log)
        .unwrap_or((200, json!({"message": "Response stored successfully"})));
    respond(status, body)
}

/// Handle POST /api/traces
async fn handle_trace(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let record = state.capture(Route::Trace, &headers, &body);
    let (status, body) = state.scripted(Route::Trace).unwrap_or_else(|| {
        (
            201,
            json!({"traceId": record.get("traceId").cloned().unwrap_or(Value::Null)}),
        )
    });
    respond(status, body)
}

/// Handle POST /api/traces/batch
async fn handle_batch(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let records = state.capture(Route::Batch, &headers, &body);
    let count = records.as_array().map(Vec::len).unwrap_or(0);
    let (status, body) = state
        .scripted(Route::Batch)
        .unwrap_or((201, json!({"count": count})));
    respond(status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_start_and_shutdown() {
        let server = MockHuggingPlace::start().await;
        assert!(server.url().starts_with("http://127.0.0.1:"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_queued_response_then_fixed() {
        let server = MockHuggingPlace::start().await;
        server.queue_response(Route::Log, 429, json!({"message": "slow down"}));
        server.respond_always(Route::Log, 503, json!({"error": "maintenance"}));

        assert_eq!(
            server.state.scripted(Route::Log),
            Some((429, json!({"message": "slow down"})))
        );
        assert_eq!(
            server.state.scripted(Route::Log),
            Some((503, json!({"error": "maintenance"})))
        );
        assert_eq!(server.state.scripted(Route::Trace), None);
        server.shutdown().await;
    }
}
