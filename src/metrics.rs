//! Prometheus metrics collection for Chatrelay
//!
//! Tracks webhook request outcomes, upstream attempt outcomes, and cursor
//! rotations. Exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Webhook outcome labels
///
/// Closed set to keep label cardinality fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Upstream produced a reply
    Replied,
    /// Pool exhausted, the configured apology message was returned
    Fallback,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replied => "replied",
            Self::Fallback => "fallback",
        }
    }
}

/// Metrics collector for Chatrelay
///
/// All counters are labelled from closed enums or the closed `InvokeError`
/// taxonomy, so recording cannot introduce unbounded label cardinality.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    webhook_requests: IntCounterVec,
    upstream_attempts: IntCounterVec,
    rotations: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests = IntCounterVec::new(
            Opts::new(
                "chatrelay_webhook_requests_total",
                "Webhook requests by outcome (replied, fallback)",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(webhook_requests.clone()))?;

        let upstream_attempts = IntCounterVec::new(
            Opts::new(
                "chatrelay_upstream_attempts_total",
                "Upstream completion attempts by outcome \
                (success, rate_limited, access_denied, other)",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(upstream_attempts.clone()))?;

        let rotations = IntCounterVec::new(
            Opts::new(
                "chatrelay_rotations_total",
                "Cursor rotations by cursor (credential, model) and trigger (failure, manual)",
            ),
            &["cursor", "trigger"],
        )?;
        registry.register(Box::new(rotations.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            webhook_requests,
            upstream_attempts,
            rotations,
        })
    }

    /// Record a completed webhook request
    pub fn record_webhook(&self, outcome: WebhookOutcome) {
        self.webhook_requests
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record one upstream attempt outcome
    ///
    /// `outcome` is "success" or an `InvokeError::kind()` label.
    pub fn record_attempt(&self, outcome: &'static str) {
        self.upstream_attempts.with_label_values(&[outcome]).inc();
    }

    /// Record a cursor rotation
    pub fn record_rotation(&self, cursor: &'static str, trigger: &'static str) {
        self.rotations.with_label_values(&[cursor, trigger]).inc();
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
