//! Failover routing across upstream credentials and models
//!
//! The router owns two cursors - one over the credential pool, one over the
//! model preference list - and tries (credential, model) combinations in a
//! deterministic order until one succeeds or the retry budget is spent.
//! Routing is sticky: a success leaves the cursors where the successful
//! attempt found them, so the next request starts from a known-good pair.

pub mod stats;

pub use stats::{CredentialStats, RouterStats};

use crate::invoke::{ChatRequest, CompletionInvoker, InvokeError};
use crate::metrics::Metrics;
use crate::pool::{Credential, CredentialPool, ModelId, ModelList};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;

/// Credential rotation policy
///
/// `Sequential` is the baseline contract: a plain modulo increment that
/// never consults failure history. `SkipRecentlyLimited` passes over
/// credentials whose most recent failure is younger than `window`, degrading
/// to the plain increment when every candidate is inside the window so
/// rotation always terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Sequential,
    SkipRecentlyLimited { window: Duration },
}

/// Every (credential, model) combination failed within the retry budget
///
/// Terminal for the call, not for the process: the cursors stay wherever
/// rotation left them and the next request picks up from there.
#[derive(Debug, Error)]
#[error("credential pool exhausted after {attempts} attempts: {last_error}")]
pub struct PoolExhausted {
    pub attempts: usize,
    pub last_error: InvokeError,
}

/// Mutable router state, guarded by a single mutex
///
/// The lock is held only across state transitions, never across the
/// upstream await, so concurrent requests overlap their network calls while
/// serializing their rotation decisions.
struct RouterState {
    credential_cursor: usize,
    model_cursor: usize,
    /// Credential index -> most recent failure time. Bounded by pool size;
    /// entries are overwritten in place, never evicted.
    failure_log: HashMap<usize, SystemTime>,
    attempts_total: u64,
    failures_total: u64,
}

/// Failover router over a credential pool and model preference list
pub struct FailoverRouter {
    pool: CredentialPool,
    models: ModelList,
    policy: RotationPolicy,
    invoker: Arc<dyn CompletionInvoker>,
    metrics: Arc<Metrics>,
    state: Mutex<RouterState>,
}

impl FailoverRouter {
    /// Create a router with cursors at (0, 0)
    pub fn new(
        pool: CredentialPool,
        models: ModelList,
        policy: RotationPolicy,
        invoker: Arc<dyn CompletionInvoker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pool,
            models,
            policy,
            invoker,
            metrics,
            state: Mutex::new(RouterState {
                credential_cursor: 0,
                model_cursor: 0,
                failure_log: HashMap::new(),
                attempts_total: 0,
                failures_total: 0,
            }),
        }
    }

    /// Try (credential, model) combinations until one succeeds or the
    /// budget of `pool size x model count` attempts is spent
    ///
    /// Rotation on failure:
    /// - `RateLimited` / `Other`: advance the credential cursor (wrapping),
    ///   reset the model cursor to 0.
    /// - `AccessDenied` with model fallback enabled: advance the model
    ///   cursor, keeping the credential, until every model has been tried
    ///   for the current credential; then advance the credential instead.
    ///
    /// Every failure is stamped into the failure log under the credential
    /// that was active when it happened.
    pub async fn invoke(&self, request: &ChatRequest) -> Result<String, PoolExhausted> {
        let budget = self.pool.len() * self.models.len();
        let mut last_error: Option<InvokeError> = None;
        // Attempts made on the credential the cursor currently points at.
        // Resets when the credential advances; bounds the AccessDenied
        // model-walk to one full cycle per credential.
        let mut tried_on_credential = 0usize;

        for attempt in 1..=budget {
            let (cred_idx, model_idx) = {
                let mut st = self.state.lock().await;
                st.attempts_total += 1;
                (st.credential_cursor, st.model_cursor)
            };
            let credential = self.pool.get(cred_idx);
            let model = self.models.get(model_idx);
            tried_on_credential += 1;

            match self.invoker.complete(credential, model, request).await {
                Ok(reply) => {
                    self.metrics.record_attempt("success");
                    if attempt > 1 {
                        tracing::info!(
                            credential = %credential,
                            model = %model,
                            attempt,
                            "Failover succeeded"
                        );
                    }
                    return Ok(reply);
                }
                Err(err) => {
                    self.metrics.record_attempt(err.kind());

                    let mut st = self.state.lock().await;
                    st.failures_total += 1;
                    st.failure_log.insert(cred_idx, SystemTime::now());

                    let walk_models = matches!(err, InvokeError::AccessDenied(_))
                        && self.models.fallback_enabled()
                        && tried_on_credential < self.models.len();

                    if walk_models {
                        st.model_cursor = (st.model_cursor + 1) % self.models.len();
                        self.metrics.record_rotation("model", "failure");
                        tracing::warn!(
                            credential = %credential,
                            model = %model,
                            attempt,
                            budget,
                            next_model_index = st.model_cursor,
                            "Model denied, advancing model cursor"
                        );
                    } else {
                        let next = self.next_credential_index(&st);
                        self.metrics.record_rotation("credential", "failure");
                        tracing::warn!(
                            credential = %credential,
                            model = %model,
                            attempt,
                            budget,
                            kind = err.kind(),
                            next_credential_index = next,
                            "Attempt failed, advancing credential cursor"
                        );
                        st.credential_cursor = next;
                        st.model_cursor = 0;
                        tried_on_credential = 0;
                    }

                    last_error = Some(err);
                }
            }
        }

        // budget >= 1 because pool and model list are both non-empty, so at
        // least one attempt ran and recorded its error
        let last_error =
            last_error.unwrap_or_else(|| InvokeError::Other("no attempts were made".to_string()));
        tracing::error!(
            attempts = budget,
            error = %last_error,
            "Credential pool exhausted"
        );
        Err(PoolExhausted {
            attempts: budget,
            last_error,
        })
    }

    /// Manually advance the credential cursor by exactly one position
    ///
    /// Always a plain modulo increment, regardless of rotation policy or
    /// failure statistics. Returns the new current credential.
    pub async fn rotate_credential(&self) -> Credential {
        let mut st = self.state.lock().await;
        st.credential_cursor = (st.credential_cursor + 1) % self.pool.len();
        st.model_cursor = 0;
        let credential = self.pool.get(st.credential_cursor).clone();
        drop(st);

        self.metrics.record_rotation("credential", "manual");
        tracing::info!(credential = %credential, "Credential rotated manually");
        credential
    }

    /// Manually advance the model cursor by exactly one position
    ///
    /// With a single configured model this wraps in place. Returns the new
    /// current model.
    pub async fn rotate_model(&self) -> ModelId {
        let mut st = self.state.lock().await;
        st.model_cursor = (st.model_cursor + 1) % self.models.len();
        let model = self.models.get(st.model_cursor).clone();
        drop(st);

        self.metrics.record_rotation("model", "manual");
        tracing::info!(model = %model, "Model rotated manually");
        model
    }

    /// Point-in-time snapshot of cursors and failure statistics
    pub async fn stats(&self) -> RouterStats {
        let st = self.state.lock().await;
        let credentials = (0..self.pool.len())
            .map(|index| CredentialStats {
                index,
                last_failure_unix: st
                    .failure_log
                    .get(&index)
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs()),
            })
            .collect();

        RouterStats {
            pool_size: self.pool.len(),
            model_count: self.models.len(),
            current_credential_index: st.credential_cursor,
            current_model_index: st.model_cursor,
            attempts_total: st.attempts_total,
            failures_total: st.failures_total,
            credentials,
        }
    }

    /// Next credential index under the configured rotation policy
    ///
    /// Sequential: plain increment. SkipRecentlyLimited: the first candidate
    /// (walking forward from the plain increment) whose last failure is
    /// older than the window; falls back to the plain increment when every
    /// candidate failed recently. A failure timestamp in the future (clock
    /// skew) counts as stale.
    fn next_credential_index(&self, st: &RouterState) -> usize {
        let plain = (st.credential_cursor + 1) % self.pool.len();
        let RotationPolicy::SkipRecentlyLimited { window } = self.policy else {
            return plain;
        };

        let now = SystemTime::now();
        for step in 0..self.pool.len() {
            let candidate = (st.credential_cursor + 1 + step) % self.pool.len();
            let recently_failed = st
                .failure_log
                .get(&candidate)
                .and_then(|t| now.duration_since(*t).ok())
                .is_some_and(|age| age < window);
            if !recently_failed {
                if candidate != plain {
                    tracing::debug!(
                        skipped_from = plain,
                        selected = candidate,
                        "Skipped recently-limited credentials during rotation"
                    );
                }
                return candidate;
            }
        }

        plain
    }
}
