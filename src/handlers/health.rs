//! Health, ping, and service-info endpoints
//!
//! `/ping` is a minimal uptime-monitor target; `/health` reports uptime and
//! a router summary; `/` identifies the service.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Router cursor summary
    pub router: RouterSummary,
}

/// Condensed router state for the health report
#[derive(Debug, Serialize)]
pub struct RouterSummary {
    pub pool_size: usize,
    pub current_credential_index: usize,
}

/// GET /health handler
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.router().stats().await;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            uptime_seconds: state.uptime_seconds(),
            router: RouterSummary {
                pool_size: stats.pool_size,
                current_credential_index: stats.current_credential_index,
            },
        }),
    )
}

/// GET /ping handler - minimal response for uptime monitoring
pub async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Service-info response for the root route
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub status: &'static str,
    pub usage: &'static str,
}

/// GET / handler
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "Chatrelay Webhook",
        status: "Online",
        usage: "POST /webhook with the auto-reply platform payload",
    })
}
