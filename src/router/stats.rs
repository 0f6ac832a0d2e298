//! Read-only router statistics snapshot
//!
//! Serialized as the body of `GET /admin/stats` and summarized in `/health`.

use serde::Serialize;

/// Per-credential failure statistics
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStats {
    /// Position in the pool
    pub index: usize,
    /// Unix timestamp (seconds) of the most recent failure, absent when the
    /// credential has never failed
    pub last_failure_unix: Option<u64>,
}

/// Snapshot of router state for observability
///
/// A point-in-time copy: holding it does not block the router.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub pool_size: usize,
    pub model_count: usize,
    pub current_credential_index: usize,
    pub current_model_index: usize,
    pub attempts_total: u64,
    pub failures_total: u64,
    pub credentials: Vec<CredentialStats>,
}
