//! Administrative endpoints: manual rotation, stats, metrics
//!
//! Rotation here is independent of failed calls - an operator can advance
//! either cursor by one position and see which credential/model became
//! current. Stats expose the router's failure log without mutating it.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::router::RouterStats;
use axum::{Extension, Json, extract::State};
use serde::Serialize;

/// Response for a manual credential rotation
#[derive(Debug, Serialize)]
pub struct RotateCredentialResponse {
    /// Index of the now-current credential
    pub current_index: usize,
    /// Redacted rendering of the now-current credential
    pub credential: String,
}

/// POST /admin/rotate/credential handler
pub async fn rotate_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Json<RotateCredentialResponse> {
    let credential = state.router().rotate_credential().await;

    tracing::info!(
        request_id = %request_id,
        credential = %credential,
        "Manual credential rotation requested"
    );

    Json(RotateCredentialResponse {
        current_index: credential.index(),
        credential: credential.redacted(),
    })
}

/// Response for a manual model rotation
#[derive(Debug, Serialize)]
pub struct RotateModelResponse {
    /// The now-current model identifier
    pub model: String,
}

/// POST /admin/rotate/model handler
pub async fn rotate_model(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Json<RotateModelResponse> {
    let model = state.router().rotate_model().await;

    tracing::info!(
        request_id = %request_id,
        model = %model,
        "Manual model rotation requested"
    );

    Json(RotateModelResponse {
        model: model.as_str().to_string(),
    })
}

/// GET /admin/stats handler
pub async fn stats(State(state): State<AppState>) -> Json<RouterStats> {
    Json(state.router().stats().await)
}

/// GET /metrics handler - Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics()
        .encode()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::str::FromStr;
    use std::sync::Arc;

    fn create_test_state() -> AppState {
        let config = Config::from_str(
            r#"
[server]
host = "127.0.0.1"
port = 3000

[upstream]
base_url = "http://localhost:9000"
api_keys = ["key-a", "key-b", "key-c"]
models = ["model-one", "model-two"]
"#,
        )
        .expect("should parse test config");
        AppState::new(Arc::new(config)).expect("should create AppState")
    }

    #[tokio::test]
    async fn test_rotate_credential_endpoint_advances_cursor() {
        let state = create_test_state();

        let Json(body) = rotate_credential(
            State(state.clone()),
            Extension(RequestId::new()),
        )
        .await;

        assert_eq!(body.current_index, 1);
        assert!(
            !body.credential.contains("key-a") && !body.credential.contains("key-b"),
            "response must not leak the raw secret: {}",
            body.credential
        );
        assert_eq!(state.router().stats().await.current_credential_index, 1);
    }

    #[tokio::test]
    async fn test_rotate_model_endpoint_advances_cursor() {
        let state = create_test_state();

        let Json(body) = rotate_model(State(state.clone()), Extension(RequestId::new())).await;
        assert_eq!(body.model, "model-two");

        let Json(body) = rotate_model(State(state), Extension(RequestId::new())).await;
        assert_eq!(body.model, "model-one", "should wrap at list size");
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_pool_shape() {
        let state = create_test_state();

        let Json(stats) = stats(State(state)).await;
        assert_eq!(stats.pool_size, 3);
        assert_eq!(stats.model_count, 2);
        assert_eq!(stats.current_credential_index, 0);
        assert!(stats.credentials.iter().all(|c| c.last_failure_unix.is_none()));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_encodes() {
        let state = create_test_state();
        state.metrics().record_attempt("success");

        let body = metrics(State(state)).await.expect("should encode");
        assert!(body.contains("chatrelay_upstream_attempts_total"));
    }
}
