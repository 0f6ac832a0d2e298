//! Command-line interface for Chatrelay
//!
//! Provides argument parsing and subcommand handling for the Chatrelay binary.

use clap::{Parser, Subcommand};

/// Webhook auto-reply relay with upstream failover
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(version)]
#[command(about = "Webhook auto-reply relay with API-key and model failover")]
#[command(
    long_about = "Chatrelay receives chat messages from an auto-reply platform, forwards \
    them to a hosted chat-completion endpoint, and rotates among multiple API keys and \
    models when the upstream rate-limits or denies access."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Chatrelay Configuration
# =======================
#
# This file configures the HTTP server, the upstream chat-completion
# endpoint, credential/model rotation, reply composition, and logging.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Per-attempt timeout for upstream calls, in seconds (1-300)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# UPSTREAM ENDPOINT
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
# Base URL of the OpenAI-compatible chat-completion endpoint.
# The /chat/completions path is appended automatically; no trailing slash.
base_url = "https://models.github.ai/inference"

# API keys to rotate through when the upstream rate-limits or fails.
# At least one usable key must exist here or in the environment variable below.
api_keys = [
    "your-first-api-key",
    # "your-second-api-key",
]

# Optional: name of an environment variable holding additional keys,
# comma-separated. Merged after the list above.
# api_keys_env = "CHATRELAY_API_KEYS"

# Model identifiers in preference order, most-preferred first.
# More than one entry enables model-level fallback on access-denied errors.
models = [
    "openai/gpt-4.1",
    # "openai/gpt-4.1-mini",
]

# Sampling parameters forwarded to the upstream
temperature = 1.0
top_p = 1.0

# ─────────────────────────────────────────────────────────────────────────────
# REPLY COMPOSITION
# ─────────────────────────────────────────────────────────────────────────────

[reply]
# System prompt prepended to every upstream request
system_prompt = "You are a helpful, friendly assistant. Reply naturally and concisely."

# Returned when every credential/model combination failed
fallback_message = "Sorry, I'm having trouble processing your message right now. Could you try again?"

# ─────────────────────────────────────────────────────────────────────────────
# ROTATION POLICY
# ─────────────────────────────────────────────────────────────────────────────

[routing]
# "sequential": plain modulo rotation (default).
# "skip_recently_limited": pass over credentials that failed within the window.
rotation = "sequential"

# Window in seconds for skip_recently_limited (ignored by sequential)
skip_window_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: trace, debug, info, warn, error
log_level = "info"
"#
}
