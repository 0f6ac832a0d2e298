//! Integration tests for the selectable rotation policy
//!
//! The baseline contract is plain sequential rotation that never consults
//! the failure log. The skip_recently_limited policy passes over credentials
//! that failed within the configured window, and must degrade to the plain
//! increment when every candidate failed recently.

use async_trait::async_trait;
use chatrelay::invoke::{ChatMessage, ChatRequest, CompletionInvoker, InvokeError};
use chatrelay::metrics::Metrics;
use chatrelay::pool::{Credential, CredentialPool, ModelId, ModelList};
use chatrelay::router::{FailoverRouter, RotationPolicy};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedInvoker {
    outcomes: Mutex<VecDeque<Result<String, InvokeError>>>,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedInvoker {
    fn new(outcomes: Vec<Result<String, InvokeError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn credential_indices(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionInvoker for ScriptedInvoker {
    async fn complete(
        &self,
        credential: &Credential,
        _model: &ModelId,
        _request: &ChatRequest,
    ) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(credential.index());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InvokeError::Other("script exhausted".to_string())))
    }
}

fn build_router(policy: RotationPolicy, invoker: Arc<ScriptedInvoker>) -> FailoverRouter {
    let pool = CredentialPool::from_keys(vec![
        "key-a".to_string(),
        "key-b".to_string(),
        "key-c".to_string(),
    ])
    .expect("test pool");
    let models = ModelList::new(["m1"]).expect("test models");
    let metrics = Arc::new(Metrics::new().expect("test metrics"));
    FailoverRouter::new(pool, models, policy, invoker, metrics)
}

fn request() -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user("hello")])
}

fn rate_limited() -> Result<String, InvokeError> {
    Err(InvokeError::RateLimited("429".to_string()))
}

/// Drive the router so that credential 1 has a fresh failure while the
/// cursor sits at 0: rotate to 1, fail there (cursor moves on to 2 where the
/// call succeeds), then rotate 2 -> 0 manually.
async fn seed_failure_on_credential_1(router: &FailoverRouter) {
    router.rotate_credential().await; // cursor 0 -> 1
    router
        .invoke(&request())
        .await
        .expect("seed invoke should succeed on credential 2");
    router.rotate_credential().await; // cursor 2 -> 0
}

#[tokio::test]
async fn test_skip_policy_passes_over_recently_limited_credential() {
    let invoker = ScriptedInvoker::new(vec![
        rate_limited(),             // seed: fails on 1
        Ok("seeded".to_string()),   // seed: succeeds on 2
        rate_limited(),             // main: fails on 0
        Ok("routed".to_string()),   // main: must land on 2, skipping 1
    ]);
    let router = build_router(
        RotationPolicy::SkipRecentlyLimited {
            window: Duration::from_secs(60),
        },
        invoker.clone(),
    );

    seed_failure_on_credential_1(&router).await;

    let reply = router.invoke(&request()).await.expect("should succeed");
    assert_eq!(reply, "routed");
    assert_eq!(
        invoker.credential_indices(),
        vec![1, 2, 0, 2],
        "rotation from 0 should skip recently-limited credential 1"
    );
}

#[tokio::test]
async fn test_sequential_policy_ignores_failure_log() {
    // Identical scenario under the baseline policy: rotation from 0 selects
    // credential 1 even though it failed moments ago.
    let invoker = ScriptedInvoker::new(vec![
        rate_limited(),
        Ok("seeded".to_string()),
        rate_limited(),
        Ok("routed".to_string()),
    ]);
    let router = build_router(RotationPolicy::Sequential, invoker.clone());

    seed_failure_on_credential_1(&router).await;

    router.invoke(&request()).await.expect("should succeed");
    assert_eq!(
        invoker.credential_indices(),
        vec![1, 2, 0, 1],
        "sequential rotation is a plain increment regardless of failures"
    );
}

#[tokio::test]
async fn test_skip_policy_degrades_to_plain_increment_when_all_recent() {
    // Exhaust the pool once so every credential has a fresh failure, then
    // verify rotation still advances one step at a time instead of spinning.
    let invoker = ScriptedInvoker::new(vec![
        rate_limited(),
        rate_limited(),
        rate_limited(),
        rate_limited(),
        Ok("eventually".to_string()),
    ]);
    let router = build_router(
        RotationPolicy::SkipRecentlyLimited {
            window: Duration::from_secs(60),
        },
        invoker.clone(),
    );

    router.invoke(&request()).await.expect_err("first call exhausts");
    let reply = router.invoke(&request()).await.expect("second call succeeds");
    assert_eq!(reply, "eventually");

    // First invoke walks 0,1,2 and wraps to 0; the second starts at 0 and
    // advances plainly to 1 despite the fresh failures everywhere.
    assert_eq!(invoker.credential_indices(), vec![0, 1, 2, 0, 1]);
}

#[tokio::test]
async fn test_skip_policy_considers_old_failures_stale() {
    // With a very short window, the seeded failure on credential 1 ages out
    // before the main invoke, so no skip happens.
    let invoker = ScriptedInvoker::new(vec![
        rate_limited(),
        Ok("seeded".to_string()),
        rate_limited(),
        Ok("routed".to_string()),
    ]);
    let router = build_router(
        RotationPolicy::SkipRecentlyLimited {
            window: Duration::from_millis(50),
        },
        invoker.clone(),
    );

    seed_failure_on_credential_1(&router).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    router.invoke(&request()).await.expect("should succeed");
    assert_eq!(invoker.credential_indices(), vec![1, 2, 0, 1]);
}
