//! Configuration management for Chatrelay
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::router::RotationPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Upstream chat-completion endpoint configuration
///
/// Fields are private to enforce invariants. Configuration is loaded via
/// deserialization and validated via Config::validate(). After construction,
/// fields cannot be mutated, ensuring validated data remains valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    base_url: String,
    /// API keys to rotate through on failure. May be supplemented (or fully
    /// replaced) by the environment variable named in `api_keys_env`.
    #[serde(default)]
    api_keys: Vec<String>,
    /// Name of an environment variable holding a comma-separated list of
    /// additional API keys. Optional.
    #[serde(default)]
    api_keys_env: Option<String>,
    /// Model identifiers in preference order, most-preferred first.
    /// A single entry disables model-level fallback.
    models: Vec<String>,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default = "default_top_p")]
    top_p: f64,
}

impl UpstreamConfig {
    /// Get the upstream base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the API keys listed in the config file
    pub fn api_keys(&self) -> &[String] {
        &self.api_keys
    }

    /// Get the name of the environment variable supplying extra API keys
    pub fn api_keys_env(&self) -> Option<&str> {
        self.api_keys_env.as_deref()
    }

    /// Get the configured model identifiers in preference order
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Get the sampling temperature forwarded to the upstream
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Get the nucleus-sampling parameter forwarded to the upstream
    pub fn top_p(&self) -> f64 {
        self.top_p
    }
}

fn default_temperature() -> f64 {
    1.0
}

fn default_top_p() -> f64 {
    1.0
}

/// Reply composition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyConfig {
    /// System prompt prepended to every upstream request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Message returned to the chat platform when every upstream
    /// credential/model combination has failed
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful, friendly assistant. Reply naturally and concisely.".to_string()
}

fn default_fallback_message() -> String {
    "Sorry, I'm having trouble processing your message right now. Could you try again?".to_string()
}

/// Credential rotation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub rotation: RotationKind,
    /// Window for the skip_recently_limited policy: credentials that failed
    /// within this many seconds are passed over when rotating. Ignored by
    /// the sequential policy.
    #[serde(default = "default_skip_window")]
    pub skip_window_seconds: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            rotation: RotationKind::default(),
            skip_window_seconds: default_skip_window(),
        }
    }
}

fn default_skip_window() -> u64 {
    60
}

/// Rotation policy selector
///
/// `sequential` is the baseline contract: a plain modulo increment that never
/// consults failure history. `skip_recently_limited` passes over credentials
/// that failed within the configured window, falling back to the plain
/// increment when every candidate is inside the window.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    #[default]
    Sequential,
    SkipRecentlyLimited,
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Build the rotation policy from the routing section
    pub fn rotation_policy(&self) -> RotationPolicy {
        match self.routing.rotation {
            RotationKind::Sequential => RotationPolicy::Sequential,
            RotationKind::SkipRecentlyLimited => RotationPolicy::SkipRecentlyLimited {
                window: Duration::from_secs(self.routing.skip_window_seconds),
            },
        }
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    ///
    /// Note: credential emptiness is NOT validated here because keys may be
    /// supplied through the environment. `CredentialPool::from_config()` is
    /// the fail-fast point for an empty pool.
    pub fn validate(&self) -> crate::error::AppResult<()> {
        // Validate base_url: must start with http:// or https://
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(crate::error::AppError::Config(format!(
                "upstream.base_url '{}' must start with 'http://' or 'https://'",
                self.upstream.base_url
            )));
        }

        // Validate base_url: no trailing slash (the invoker appends its own path)
        if self.upstream.base_url.ends_with('/') {
            return Err(crate::error::AppError::Config(format!(
                "upstream.base_url '{}' must not end with '/'",
                self.upstream.base_url
            )));
        }

        // Validate models: non-empty ordered preference list
        if self.upstream.models.is_empty() {
            return Err(crate::error::AppError::Config(
                "upstream.models must list at least one model identifier".to_string(),
            ));
        }
        if self.upstream.models.iter().any(|m| m.trim().is_empty()) {
            return Err(crate::error::AppError::Config(
                "upstream.models must not contain empty entries".to_string(),
            ));
        }

        // Validate temperature: standard LLM range
        if self.upstream.temperature < 0.0
            || self.upstream.temperature > 2.0
            || self.upstream.temperature.is_nan()
            || self.upstream.temperature.is_infinite()
        {
            return Err(crate::error::AppError::Config(format!(
                "upstream.temperature {} must be a finite number between 0.0 and 2.0",
                self.upstream.temperature
            )));
        }

        // Validate top_p: (0.0, 1.0]
        if !(self.upstream.top_p > 0.0 && self.upstream.top_p <= 1.0) {
            return Err(crate::error::AppError::Config(format!(
                "upstream.top_p {} must be in (0.0, 1.0]",
                self.upstream.top_p
            )));
        }

        // Validate request timeout: (0, 300] seconds
        if self.server.request_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.server.request_timeout_seconds > 300 {
            return Err(crate::error::AppError::Config(format!(
                "server.request_timeout_seconds cannot exceed 300 seconds (5 minutes), got {}",
                self.server.request_timeout_seconds
            )));
        }

        // Validate skip window: only meaningful for skip_recently_limited,
        // but a zero window would make that policy equivalent to sequential
        // in a confusing way, so reject it up front.
        if self.routing.rotation == RotationKind::SkipRecentlyLimited
            && self.routing.skip_window_seconds == 0
        {
            return Err(crate::error::AppError::Config(
                "routing.skip_window_seconds must be greater than 0 \
                when rotation = \"skip_recently_limited\""
                    .to_string(),
            ));
        }
        if self.routing.skip_window_seconds > 3600 {
            return Err(crate::error::AppError::Config(format!(
                "routing.skip_window_seconds cannot exceed 3600 seconds (1 hour), got {}",
                self.routing.skip_window_seconds
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        // Validate config before returning
        config.validate()?;
        Ok(config)
    }
}
