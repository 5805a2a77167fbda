use std::{
    collections::VecDeque,
    error::Error as _,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use retrying_http::{
    RequestSpec, RetryError, RetryOptions, RetryingHttpClient, TransportConfig, TransportError,
};
use serde_json::json;

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    delay: Duration,
}

impl MockResponse {
    fn bytes(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            delay: Duration::from_millis(0),
        }
    }

    fn text(status: StatusCode, body: &str) -> Self {
        Self::bytes(status, body.as_bytes())
    }

    fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct SeenRequest {
    uri: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    hits: Arc<AtomicUsize>,
}

async fn handler(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .seen
        .lock()
        .expect("seen requests mutex must not be poisoned")
        .push(SeenRequest {
            uri: uri.to_string(),
            headers,
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "no mock response available")
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, response.headers, response.body)
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen
            .lock()
            .expect("seen requests mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        seen: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new().fallback(handler).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        seen: state.seen,
        task,
    }
}

fn fast_retries(max_attempts: u32) -> RetryOptions {
    RetryOptions {
        retry_delay_ms: 1,
        max_attempts,
    }
}

fn client_for(server: &TestServer, max_attempts: u32) -> RetryingHttpClient {
    RetryingHttpClient::new(&TransportConfig::default().with_base_url(&server.base_url))
        .expect("client must build")
        .with_options(fast_retries(max_attempts))
}

#[tokio::test]
async fn success_returns_response_unmodified() {
    let server = spawn_server(vec![MockResponse::text(StatusCode::OK, r#"{"id":7}"#)]).await;
    let client = client_for(&server, 3);

    let response = client
        .send(&RequestSpec::get("/v1/items/7"))
        .await
        .expect("request must succeed");

    assert_eq!(response.status, 200);
    let body: serde_json::Value = response.json().expect("body must be json");
    assert_eq!(body, json!({"id": 7}));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn retries_on_server_error_then_succeeds() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        MockResponse::text(StatusCode::OK, "recovered"),
    ])
    .await;
    let client = client_for(&server, 3);

    let response = client
        .send(&RequestSpec::get("/v1/status"))
        .await
        .expect("request must succeed after retry");

    assert_eq!(response.text().expect("body must be utf-8"), "recovered");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn persistent_failure_exhausts_attempts() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::SERVICE_UNAVAILABLE, "down"),
        MockResponse::text(StatusCode::SERVICE_UNAVAILABLE, "down"),
        MockResponse::text(StatusCode::OK, "too late"),
    ])
    .await;
    let client = client_for(&server, 2);

    let err = client
        .send(&RequestSpec::get("/v1/status"))
        .await
        .expect_err("request must exhaust attempts");

    assert_eq!(err.to_string(), "Number of attempts exceeded.");
    match &err {
        RetryError::AttemptsExceeded {
            last: TransportError::Http { status, body },
        } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "down");
        }
        other => panic!("expected exhausted http failure, got {other:?}"),
    }
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn binary_body_and_raw_headers_pass_through_unmodified() {
    let payload = vec![0x89, b'P', b'N', b'G', 0xff, 0xfe, 0x00, 0x80];
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::BAD_GATEWAY, "retry me"),
        MockResponse::bytes(StatusCode::OK, payload.clone()).with_header(
            "x-label",
            HeaderValue::from_bytes(b"caf\xe9").expect("obs-text is a valid header value"),
        ),
    ])
    .await;
    let client = client_for(&server, 3);

    let response = client
        .send(&RequestSpec::get("/v1/logo.png"))
        .await
        .expect("request must succeed after retry");

    assert_eq!(response.body, payload);
    assert!(response.text().is_err());
    assert_eq!(response.headers["x-label"].as_bytes(), b"caf\xe9");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn client_errors_are_retried_like_any_failure() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::NOT_FOUND, "missing"),
        MockResponse::text(StatusCode::OK, "found"),
    ])
    .await;
    let client = client_for(&server, 3);

    let response = client
        .send(&RequestSpec::get("/v1/items/1"))
        .await
        .expect("404 must be retried");

    assert_eq!(response.text().expect("body must be utf-8"), "found");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn rate_limited_requests_recover() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::TOO_MANY_REQUESTS, "slow down"),
        MockResponse::text(StatusCode::TOO_MANY_REQUESTS, "slow down"),
        MockResponse::text(StatusCode::OK, "ok"),
    ])
    .await;
    let client = client_for(&server, 0);

    let response = client
        .send(&RequestSpec::get("/v1/quota"))
        .await
        .expect("unbounded retry must succeed");

    assert_eq!(response.text().expect("body must be utf-8"), "ok");
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn base_options_are_merged_into_every_attempt() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::BAD_GATEWAY, "retry me"),
        MockResponse::text(StatusCode::CREATED, "created"),
    ])
    .await;
    let config = TransportConfig::default()
        .with_base_url(format!("{}/api/", server.base_url))
        .with_header("x-app", "retrying-http")
        .with_header("x-env", "default")
        .with_bearer_token("token-123")
        .with_user_agent("retrying-http-tests/1.0");
    let client = RetryingHttpClient::new(&config)
        .expect("client must build")
        .with_options(fast_retries(3));

    let spec = RequestSpec::post("v1/items")
        .header("x-env", "override")
        .query("dry_run", "true")
        .json(json!({"name": "widget"}));
    let response = client.send(&spec).await.expect("request must succeed");

    assert_eq!(response.status, 201);
    let seen = server.seen();
    assert_eq!(seen.len(), 2);
    for request in &seen {
        assert_eq!(request.uri, "/api/v1/items?dry_run=true");
        assert_eq!(request.headers["x-app"], "retrying-http");
        assert_eq!(request.headers["x-env"], "override");
        assert_eq!(request.headers["authorization"], "Bearer token-123");
        assert_eq!(request.headers["user-agent"], "retrying-http-tests/1.0");
        assert_eq!(request.headers["content-type"], "application/json");
        let body: serde_json::Value =
            serde_json::from_str(&request.body).expect("body must be json");
        assert_eq!(body, json!({"name": "widget"}));
    }
}

#[tokio::test]
async fn transport_timeout_is_retried_then_reported_as_cause() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "slow").with_delay(Duration::from_millis(150)),
        MockResponse::text(StatusCode::OK, "slow").with_delay(Duration::from_millis(150)),
    ])
    .await;
    let config = TransportConfig::default()
        .with_base_url(&server.base_url)
        .with_timeout_ms(20);
    let client = RetryingHttpClient::new(&config)
        .expect("client must build")
        .with_options(fast_retries(2));

    let err = client
        .send(&RequestSpec::get("/v1/slow"))
        .await
        .expect_err("request must time out");

    match &err {
        RetryError::AttemptsExceeded {
            last: TransportError::Request(inner),
        } => assert!(inner.is_timeout()),
        other => panic!("expected exhausted timeout, got {other:?}"),
    }
    assert!(err.source().is_some());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn concurrent_requests_share_one_client() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "one"),
        MockResponse::text(StatusCode::OK, "two"),
        MockResponse::text(StatusCode::OK, "three"),
    ])
    .await;
    let client = client_for(&server, 3);

    let tasks: Vec<_> = (0..3)
        .map(|index| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send(&RequestSpec::get(format!("/v1/items/{index}")))
                    .await
            })
        })
        .collect();

    let mut bodies = Vec::new();
    for task in tasks {
        let response = task
            .await
            .expect("task must not panic")
            .expect("request must succeed");
        bodies.push(
            response
                .text()
                .expect("body must be utf-8")
                .to_owned(),
        );
    }
    bodies.sort();

    assert_eq!(bodies, vec!["one", "three", "two"]);
    assert_eq!(server.hits(), 3);
}
