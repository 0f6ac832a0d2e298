//! HTTP invoker for OpenAI-compatible chat-completion endpoints
//!
//! Issues one `POST {base_url}/chat/completions` per invocation with bearer
//! authentication and a per-attempt timeout, then classifies failures into
//! the closed `InvokeError` taxonomy before the router ever sees them.

use super::{ChatRequest, CompletionInvoker, InvokeError};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::pool::{Credential, ModelId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wire request body for the chat-completion call
#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [super::ChatMessage],
    temperature: f64,
    top_p: f64,
}

/// Wire response body: the reply text lives at `choices[0].message.content`
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Error body shape shared by OpenAI-compatible endpoints
///
/// Only `error.code` and `error.message` are consulted; everything else is
/// ignored. Parsing failures fall back to status-only classification.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Chat-completion invoker speaking the OpenAI-compatible REST protocol
pub struct HttpInvoker {
    client: reqwest::Client,
    completions_url: String,
    temperature: f64,
    top_p: f64,
}

impl HttpInvoker {
    /// Build an invoker from configuration
    ///
    /// The per-attempt timeout comes from `server.request_timeout_seconds`
    /// and is enforced by the underlying client, covering connection
    /// establishment through the full response body.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", config.upstream.base_url()),
            temperature: config.upstream.temperature(),
            top_p: config.upstream.top_p(),
        })
    }

    #[cfg(test)]
    fn for_tests(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            completions_url: format!("{}/chat/completions", base_url),
            temperature: 1.0,
            top_p: 1.0,
        }
    }
}

/// Map an upstream error response into the closed taxonomy
///
/// Pure function over status and raw body so classification is testable
/// without a network. Rules:
/// - 429, or an error code signalling quota exhaustion -> `RateLimited`
/// - 401/403, or 404 with a model-oriented error code -> `AccessDenied`
/// - everything else -> `Other`
fn classify_response(status: StatusCode, body: &str) -> InvokeError {
    let detail: ErrorDetail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or_default();
    let code = detail.code.as_deref().unwrap_or("");
    let message = detail
        .message
        .unwrap_or_else(|| truncate(body, 200).to_string());

    if status == StatusCode::TOO_MANY_REQUESTS
        || code == "rate_limit_exceeded"
        || code == "insufficient_quota"
    {
        return InvokeError::RateLimited(format!("{}: {}", status.as_u16(), message));
    }

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (status == StatusCode::NOT_FOUND
            && (code == "model_not_found" || code == "unknown_model"))
    {
        return InvokeError::AccessDenied(format!("{}: {}", status.as_u16(), message));
    }

    InvokeError::Other(format!("{}: {}", status.as_u16(), message))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl CompletionInvoker for HttpInvoker {
    async fn complete(
        &self,
        credential: &Credential,
        model: &ModelId,
        request: &ChatRequest,
    ) -> Result<String, InvokeError> {
        let body = CompletionBody {
            model: model.as_str(),
            messages: request.messages(),
            temperature: self.temperature,
            top_p: self.top_p,
        };

        tracing::debug!(
            credential = %credential,
            model = %model,
            message_count = request.messages().len(),
            "Issuing chat-completion request"
        );

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(credential.secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Other(format!("request timed out: {}", e))
                } else {
                    InvokeError::Other(format!("transport error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let classified = classify_response(status, &raw);
            tracing::warn!(
                credential = %credential,
                model = %model,
                status = status.as_u16(),
                kind = classified.kind(),
                "Upstream returned error status"
            );
            return Err(classified);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::Other(format!("malformed completion response: {}", e)))?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                InvokeError::Other("completion response contained no choices".to_string())
            })?;

        tracing::debug!(
            credential = %credential,
            model = %model,
            reply_length = reply.len(),
            "Chat-completion request succeeded"
        );

        Ok(reply)
    }
}
