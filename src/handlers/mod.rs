//! HTTP request handlers for the Chatrelay API

use crate::config::Config;
use crate::error::AppResult;
use crate::invoke::HttpInvoker;
use crate::metrics::Metrics;
use crate::pool::{CredentialPool, ModelList};
use crate::router::FailoverRouter;
use std::sync::Arc;
use std::time::Instant;

pub mod admin;
pub mod health;
pub mod webhook;

/// Application state shared across all handlers
///
/// Contains configuration, the failover router, and metrics. All fields are
/// Arc'd for cheap cloning across Axum handlers. The router instance is the
/// single owner of rotation state - no module-level globals.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    router: Arc<FailoverRouter>,
    metrics: Arc<Metrics>,
    started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// Builds the credential pool (the fail-fast point for a missing key
    /// set), the model list, the HTTP invoker, and the router.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let pool = CredentialPool::from_config(&config.upstream)?;
        let models = ModelList::new(config.upstream.models())?;
        let invoker = Arc::new(HttpInvoker::from_config(&config)?);
        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| crate::error::AppError::Internal(format!("metrics init: {}", e)))?,
        );
        let router = Arc::new(FailoverRouter::new(
            pool,
            models,
            config.rotation_policy(),
            invoker,
            metrics.clone(),
        ));

        Ok(Self {
            config,
            router,
            metrics,
            started_at: Instant::now(),
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the failover router
    pub fn router(&self) -> &FailoverRouter {
        &self.router
    }

    /// Get reference to the metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Seconds since this state (and thus the process) was created
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Build the full application router over the given state
pub fn app(state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", get(health::root))
        .route("/ping", get(health::ping))
        .route("/health", get(health::handler))
        .route("/metrics", get(admin::metrics))
        .route("/webhook", post(webhook::handler))
        .route("/admin/rotate/credential", post(admin::rotate_credential))
        .route("/admin/rotate/model", post(admin::rotate_model))
        .route("/admin/stats", get(admin::stats))
        .layer(axum::middleware::from_fn(
            crate::middleware::request_id_middleware,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
