//! Credential pool and model preference list
//!
//! Both collections are constructed once at startup from configuration and
//! never mutated afterwards. The pool is the fail-fast point for a missing
//! credential set: the process refuses to start with zero usable keys.

use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};
use std::fmt;

/// One upstream API credential with its stable position in the pool
///
/// The secret is never exposed through `Debug` or `Display`; both render a
/// redacted form so credentials cannot leak into logs.
#[derive(Clone)]
pub struct Credential {
    index: usize,
    secret: String,
}

impl Credential {
    /// Position in the pool, stable for the process lifetime
    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw secret, for the invoker's auth header only
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Redacted rendering safe for logs: first few characters plus length
    pub fn redacted(&self) -> String {
        let prefix: String = self.secret.chars().take(4).collect();
        format!("{}…({} chars)", prefix, self.secret.chars().count())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.redacted())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("secret", &self.redacted())
            .finish()
    }
}

/// Ordered, immutable pool of upstream credentials
///
/// Built from the config file list merged with an optional environment
/// variable (comma-separated). Empty and whitespace-only entries are
/// filtered out; an empty result is a fatal startup error.
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build the pool from upstream configuration
    ///
    /// Merges `api_keys` from the config file with the comma-separated list
    /// in the environment variable named by `api_keys_env` (if set), in that
    /// order. Filters out blank entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no usable key remains after
    /// filtering. This is the one legitimate fail-fast in the system.
    pub fn from_config(upstream: &UpstreamConfig) -> AppResult<Self> {
        let mut raw: Vec<String> = upstream.api_keys().to_vec();

        if let Some(var) = upstream.api_keys_env() {
            match std::env::var(var) {
                Ok(value) => {
                    raw.extend(value.split(',').map(|s| s.to_string()));
                }
                Err(std::env::VarError::NotPresent) => {
                    tracing::debug!(env_var = var, "API key environment variable not set");
                }
                Err(e) => {
                    return Err(AppError::Config(format!(
                        "failed to read API keys from environment variable '{}': {}",
                        var, e
                    )));
                }
            }
        }

        Self::from_keys(raw)
    }

    /// Build the pool from an ordered list of raw key strings
    ///
    /// Blank entries are filtered; indices are assigned after filtering so
    /// they are dense and stable.
    pub fn from_keys<I>(keys: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(index, secret)| Credential { index, secret })
            .collect();

        if credentials.is_empty() {
            return Err(AppError::Config(
                "credential pool is empty: no usable API keys found in \
                upstream.api_keys or the configured environment variable"
                    .to_string(),
            ));
        }

        tracing::info!(pool_size = credentials.len(), "Credential pool constructed");

        Ok(Self { credentials })
    }

    /// Number of credentials in the pool (always >= 1)
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false: construction rejects an empty pool
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Get the credential at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`. Callers derive indices modulo `len()`,
    /// so an out-of-range index is a programming error.
    pub fn get(&self, index: usize) -> &Credential {
        &self.credentials[index]
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("size", &self.credentials.len())
            .finish()
    }
}

/// A model identifier, e.g. a vendor/model pair like "openai/gpt-4.1"
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModelId(String);

impl ModelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Ordered model preference list, most-preferred first
///
/// Always non-empty (config validation rejects an empty list). Model-level
/// fallback is enabled when more than one model is configured; with a single
/// model the router degrades to credential-only rotation.
#[derive(Debug, Clone)]
pub struct ModelList {
    models: Vec<ModelId>,
}

impl ModelList {
    /// Build the list from configured model identifier strings
    pub fn new<I, S>(models: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let models: Vec<ModelId> = models
            .into_iter()
            .map(|m| ModelId(m.as_ref().trim().to_string()))
            .filter(|m| !m.0.is_empty())
            .collect();

        if models.is_empty() {
            return Err(AppError::Config(
                "model list is empty: upstream.models must name at least one model".to_string(),
            ));
        }

        Ok(Self { models })
    }

    /// Number of models in the list (always >= 1)
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Get the model at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`; indices are derived modulo `len()`.
    pub fn get(&self, index: usize) -> &ModelId {
        &self.models[index]
    }

    /// Whether model-level fallback is enabled (more than one model)
    pub fn fallback_enabled(&self) -> bool {
        self.models.len() > 1
    }
}
