//! Webhook endpoint handler
//!
//! Receives inbound chat messages from the auto-reply platform, forwards
//! them through the failover router, and answers in the platform's fixed
//! reply envelope. Router exhaustion is translated into the configured
//! fallback message, never an error status: the platform always receives a
//! well-formed reply.

use crate::handlers::AppState;
use crate::invoke::{ChatMessage, ChatRequest};
use crate::metrics::WebhookOutcome;
use crate::middleware::RequestId;
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum allowed message length in characters
const MAX_MESSAGE_LENGTH: usize = 8_000;

/// Inbound webhook payload from the auto-reply platform
///
/// Field names are camelCase on the wire. Validation is enforced during
/// deserialization - invalid instances cannot exist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    sender_message: String,
    sender_name: String,
    group_name: Option<String>,
    is_message_from_group: bool,
}

impl WebhookRequest {
    /// Get the message text
    pub fn sender_message(&self) -> &str {
        &self.sender_message
    }

    /// Get the sender's display name
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    /// Get the group name, when the message came from a group
    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    /// Whether the message came from a group conversation
    pub fn is_message_from_group(&self) -> bool {
        self.is_message_from_group
    }
}

/// Custom Deserialize implementation that validates during deserialization
impl<'de> Deserialize<'de> for WebhookRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawWebhookRequest {
            sender_message: String,
            #[serde(default)]
            sender_name: String,
            #[serde(default)]
            group_name: Option<String>,
            #[serde(default)]
            is_message_from_group: bool,
        }

        let raw = RawWebhookRequest::deserialize(deserializer)?;

        // Validate message is not empty or whitespace-only
        if raw.sender_message.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "senderMessage cannot be empty or contain only whitespace",
            ));
        }

        // Validate message length (count Unicode characters, not bytes)
        let char_count = raw.sender_message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "senderMessage exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        Ok(WebhookRequest {
            sender_message: raw.sender_message,
            sender_name: raw.sender_name,
            group_name: raw.group_name,
            is_message_from_group: raw.is_message_from_group,
        })
    }
}

/// Reply envelope expected by the auto-reply platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    data: Vec<ReplyData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyData {
    message: String,
}

impl ReplyEnvelope {
    /// Wrap a single reply message in the platform envelope
    pub fn reply(message: impl Into<String>) -> Self {
        Self {
            data: vec![ReplyData {
                message: message.into(),
            }],
        }
    }

    /// Get the first reply message, if any
    pub fn first_message(&self) -> Option<&str> {
        self.data.first().map(|d| d.message.as_str())
    }
}

/// POST /webhook handler
///
/// Composes the upstream conversation (configured system prompt + the
/// sender's message) and routes it through the failover router. The
/// response is always HTTP 200 with the platform envelope; pool exhaustion
/// yields the configured fallback message instead of an error status.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<WebhookRequest>,
) -> Json<ReplyEnvelope> {
    tracing::info!(
        request_id = %request_id,
        sender = %request.sender_name(),
        group = request.group_name().unwrap_or("-"),
        from_group = request.is_message_from_group(),
        message_length = request.sender_message().len(),
        "Received webhook message"
    );

    let chat_request = ChatRequest::new(vec![
        ChatMessage::system(&state.config().reply.system_prompt),
        ChatMessage::user(request.sender_message()),
    ]);

    match state.router().invoke(&chat_request).await {
        Ok(reply) => {
            state.metrics().record_webhook(WebhookOutcome::Replied);
            tracing::info!(
                request_id = %request_id,
                reply_length = reply.len(),
                "Webhook reply generated"
            );
            Json(ReplyEnvelope::reply(reply))
        }
        Err(exhausted) => {
            state.metrics().record_webhook(WebhookOutcome::Fallback);
            tracing::error!(
                request_id = %request_id,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "Upstream exhausted, returning fallback message"
            );
            Json(ReplyEnvelope::reply(
                state.config().reply.fallback_message.clone(),
            ))
        }
    }
}
