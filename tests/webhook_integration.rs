//! Integration tests for the webhook round-trip against a mock upstream
//!
//! Covers the full path: webhook payload -> prompt scaffolding -> failover
//! router -> HTTP invoker -> mock chat-completion endpoint -> reply
//! envelope. Failure cases verify key rotation, model fallback, and the
//! apology fallback on pool exhaustion.

use axum::{Extension, Json, extract::State};
use chatrelay::config::Config;
use chatrelay::handlers::webhook::{self, WebhookRequest};
use chatrelay::handlers::{self, AppState};
use chatrelay::middleware::RequestId;
use std::str::FromStr;
use std::sync::Arc;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn build_state(server_uri: &str, keys: &[&str], models: &[&str]) -> AppState {
    let keys_toml = keys
        .iter()
        .map(|k| format!("\"{}\"", k))
        .collect::<Vec<_>>()
        .join(", ");
    let models_toml = models
        .iter()
        .map(|m| format!("\"{}\"", m))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 3000
request_timeout_seconds = 5

[upstream]
base_url = "{server_uri}"
api_keys = [{keys_toml}]
models = [{models_toml}]

[reply]
system_prompt = "You are a test assistant."
fallback_message = "Sorry, please try again later."
"#
    );
    let config = Config::from_str(&toml).expect("test config should parse");
    AppState::new(Arc::new(config)).expect("should build state")
}

fn webhook_request(message: &str) -> WebhookRequest {
    let json = format!(
        r#"{{"senderMessage": "{}", "senderName": "Ana", "groupName": null, "isMessageFromGroup": false}}"#,
        message
    );
    serde_json::from_str(&json).expect("test payload should deserialize")
}

fn completion_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_webhook_returns_reply_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "messages": [
                {"role": "system", "content": "You are a test assistant."},
                {"role": "user", "content": "Hello there"}
            ]
        })))
        .respond_with(completion_reply("Hi Ana!"))
        .expect(1)
        .mount(&server)
        .await;

    let state = build_state(&server.uri(), &["key-one"], &["test-model"]);

    let Json(envelope) = webhook::handler(
        State(state),
        Extension(RequestId::new()),
        Json(webhook_request("Hello there")),
    )
    .await;

    assert_eq!(envelope.first_message(), Some("Hi Ana!"));
}

#[tokio::test]
async fn test_webhook_rotates_key_on_rate_limit() {
    let server = MockServer::start().await;

    // First key is over quota; the second answers
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("key-one"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"code": "rate_limit_exceeded", "message": "slow down"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("key-two"))
        .respond_with(completion_reply("Answered by key two"))
        .expect(1)
        .mount(&server)
        .await;

    let state = build_state(&server.uri(), &["key-one", "key-two"], &["test-model"]);

    let Json(envelope) = webhook::handler(
        State(state.clone()),
        Extension(RequestId::new()),
        Json(webhook_request("Hi")),
    )
    .await;

    assert_eq!(envelope.first_message(), Some("Answered by key two"));

    // Sticky routing: the winning key stays current, the failure is logged
    let stats = state.router().stats().await;
    assert_eq!(stats.current_credential_index, 1);
    assert!(stats.credentials[0].last_failure_unix.is_some());
}

#[tokio::test]
async fn test_webhook_falls_back_to_next_model_on_access_denied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": "big-model"})))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"message": "model not available for this key"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": "small-model"})))
        .respond_with(completion_reply("Answered by small model"))
        .expect(1)
        .mount(&server)
        .await;

    let state = build_state(&server.uri(), &["key-one"], &["big-model", "small-model"]);

    let Json(envelope) = webhook::handler(
        State(state.clone()),
        Extension(RequestId::new()),
        Json(webhook_request("Hi")),
    )
    .await;

    assert_eq!(envelope.first_message(), Some("Answered by small model"));

    let stats = state.router().stats().await;
    assert_eq!(stats.current_credential_index, 0, "credential unchanged");
    assert_eq!(stats.current_model_index, 1, "model cursor advanced");
}

#[tokio::test]
async fn test_webhook_returns_apology_when_pool_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let state = build_state(&server.uri(), &["key-one", "key-two"], &["test-model"]);

    let Json(envelope) = webhook::handler(
        State(state.clone()),
        Extension(RequestId::new()),
        Json(webhook_request("Hi")),
    )
    .await;

    // The platform always receives a well-formed reply, never an error
    assert_eq!(
        envelope.first_message(),
        Some("Sorry, please try again later.")
    );

    let stats = state.router().stats().await;
    assert_eq!(stats.failures_total, 2);
}

#[tokio::test]
async fn test_full_app_routes_and_request_id_header() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion_reply("routed reply"))
        .mount(&server)
        .await;

    let state = build_state(&server.uri(), &["key-one"], &["test-model"]);
    let app = handlers::app(state);

    // Ping
    let response = app
        .clone()
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("x-request-id"),
        "request id middleware should stamp every response"
    );

    // Health
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["router"]["pool_size"], 1);

    // Webhook through the routing layer
    let response = app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"senderMessage": "Hi", "senderName": "Ana"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"][0]["message"], "routed reply");

    // Admin stats
    let response = app
        .clone()
        .oneshot(Request::get("/admin/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Metrics exposition
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chatrelay_upstream_attempts_total"));
}

#[tokio::test]
async fn test_webhook_rejects_empty_message_at_routing_layer() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let server = MockServer::start().await;
    let state = build_state(&server.uri(), &["key-one"], &["test-model"]);
    let app = handlers::app(state);

    let response = app
        .oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"senderMessage": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status().is_client_error(),
        "whitespace-only message must be rejected before reaching the router"
    );
}
