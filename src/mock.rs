// Mock SSE backend
// Test double for a streaming chat-completion target: tunable chunk count and
// inter-chunk delay, optional injected failures, a liveness endpoint, and a
// usage endpoint reporting the counters the harness polls for.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const WORDS: &[&str] = &[
    "The", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog.", "Pack", "my", "box",
    "with", "five", "dozen", "liquor", "jugs.", "How", "vexingly", "quick", "daft", "zebras",
    "jump.",
];

/// Tunables for the fixture.
#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    /// Listen address
    pub host: String,
    /// Port to listen on (0 for random)
    pub port: u16,
    /// SSE data chunks per streaming response
    pub chunk_count: usize,
    /// Delay between chunks in milliseconds
    pub chunk_delay_ms: u64,
    /// Fraction of requests answered with a 500 (0.0 to 1.0)
    pub error_rate: f64,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            chunk_count: 20,
            chunk_delay_ms: 50,
            error_rate: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct UsageCounters {
    active_streams: AtomicUsize,
    total_requests: AtomicU64,
    total_failures: AtomicU64,
}

struct BackendState {
    config: MockBackendConfig,
    usage: Arc<UsageCounters>,
}

/// Mock streaming backend. Binds on start, serves until stopped or dropped.
pub struct MockSseBackend {
    config: MockBackendConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockSseBackend {
    pub fn new(config: MockBackendConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the backend and return the bound port.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let state = Arc::new(BackendState {
            config: self.config.clone(),
            usage: Arc::new(UsageCounters::default()),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .route("/v1/usage", get(handle_usage))
            .route("/health", get(handle_health))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.config.host, self.port)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockSseBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps the active_streams counter honest for the life of one response
/// body, whether it completes or the client disconnects mid-stream.
struct ActiveStreamGuard(Arc<UsageCounters>);

impl ActiveStreamGuard {
    fn new(usage: Arc<UsageCounters>) -> Self {
        usage.active_streams.fetch_add(1, Ordering::Relaxed);
        Self(usage)
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        self.0.active_streams.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn handle_messages(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.usage.total_requests.fetch_add(1, Ordering::Relaxed);

    if state.config.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < state.config.error_rate {
        state.usage.total_failures.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    let streaming = body
        .get("stream")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !streaming {
        let response = serde_json::json!({
            "id": format!("msg-mock-{}", uuid::Uuid::new_v4()),
            "model": "mock-model",
            "role": "assistant",
            "content": [{"type": "text", "text": "Hello from mock backend."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        return Json(response).into_response();
    }

    let stream = sse_stream(state.clone());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Mock-Chunks", state.config.chunk_count.to_string())
        .header("X-Mock-Delay-Ms", state.config.chunk_delay_ms.to_string())
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn sse_stream(
    state: Arc<BackendState>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let _guard = ActiveStreamGuard::new(state.usage.clone());
        let delay = Duration::from_millis(state.config.chunk_delay_ms);

        for i in 0..state.config.chunk_count {
            let word = WORDS[i % WORDS.len()];
            yield Ok(make_sse_chunk(i, word));
            tokio::time::sleep(delay).await;
        }

        yield Ok(Bytes::from("data: [DONE]\n\n"));
    }
}

/// One SSE event in the shape a streaming messages endpoint emits.
fn make_sse_chunk(index: usize, word: &str) -> Bytes {
    let payload = serde_json::json!({
        "type": "content_block_delta",
        "index": index,
        "delta": {"type": "text_delta", "text": format!("{} ", word)},
    });
    Bytes::from(format!("event: content_block_delta\ndata: {}\n\n", payload))
}

async fn handle_usage(State(state): State<Arc<BackendState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "active_streams": state.usage.active_streams.load(Ordering::Relaxed) as f64,
        "total_requests": state.usage.total_requests.load(Ordering::Relaxed),
        "total_failures": state.usage.total_failures.load(Ordering::Relaxed),
    }))
}

async fn handle_health() -> &'static str {
    "ok"
}
