//! Chat-completion invocation boundary
//!
//! Defines the request/reply types exchanged with the upstream endpoint and
//! the `CompletionInvoker` trait the failover router drives. The invoker
//! performs exactly one outbound call per invocation and owns error
//! classification; every retry/fallback decision lives in the router.

pub mod http;

pub use http::HttpInvoker;

use crate::pool::{Credential, ModelId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role tag for a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An ordered conversation to send upstream
///
/// Immutable once constructed for a given call attempt; the field is private
/// so the message sequence cannot be modified after construction.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Classified upstream failure
///
/// The closed taxonomy the router's rotation policy is written against.
/// Raw upstream errors (status codes, error-body codes, transport errors)
/// are mapped into these variants at the invoker boundary so no string
/// matching ever reaches the policy layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// Upstream explicitly signalled quota exhaustion for this credential
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    /// The credential is not entitled to the requested model
    #[error("access denied for model: {0}")]
    AccessDenied(String),

    /// Network, timeout, malformed response, or any unclassified failure
    #[error("upstream call failed: {0}")]
    Other(String),
}

impl InvokeError {
    /// Stable label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::AccessDenied(_) => "access_denied",
            Self::Other(_) => "other",
        }
    }
}

/// One outbound chat-completion call
///
/// Implementations issue a single request with the given credential and
/// model and return the reply text or a classified error. No retries here.
#[async_trait]
pub trait CompletionInvoker: Send + Sync {
    async fn complete(
        &self,
        credential: &Credential,
        model: &ModelId,
        request: &ChatRequest,
    ) -> Result<String, InvokeError>;
}
