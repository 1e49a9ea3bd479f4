//! Configuration management

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Bot configuration, loaded once at startup and read-only afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // =========================================================================
    // LINE Messaging API
    // =========================================================================
    /// Channel secret used to verify `x-line-signature`
    pub line_channel_secret: String,

    /// Channel access token used for the reply API
    pub line_channel_token: String,

    /// Base URL of the LINE Messaging API
    #[serde(default = "default_line_api_base")]
    pub line_api_base: String,

    // =========================================================================
    // OpenAI
    // =========================================================================
    pub openai_api_key: String,

    /// Chat model used for translation
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Override for OpenAI-compatible endpoints
    #[serde(default)]
    pub openai_base_url: Option<String>,

    // =========================================================================
    // Server
    // =========================================================================
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: String,

    /// Number of workers draining the webhook event queue
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Webhook requests that may wait for a worker before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Enable debug mode (log raw webhook payloads)
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_worker_count() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    256
}

impl BotConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let line_channel_secret = get("LINE_CHANNEL_SECRET");
        let line_channel_token = get("LINE_CHANNEL_TOKEN");
        let openai_api_key = get("OPENAI_API_KEY");

        let (Some(line_channel_secret), Some(line_channel_token), Some(openai_api_key)) =
            (line_channel_secret, line_channel_token, openai_api_key)
        else {
            let missing: Vec<&str> = ["LINE_CHANNEL_SECRET", "LINE_CHANNEL_TOKEN", "OPENAI_API_KEY"]
                .into_iter()
                .filter(|key| get(*key).is_none())
                .collect();
            return Err(anyhow!("Missing required configuration: {}", missing.join(", ")));
        };

        Ok(Self {
            line_channel_secret,
            line_channel_token,
            line_api_base: get("LINE_API_BASE").unwrap_or_else(default_line_api_base),

            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(default_openai_model),
            openai_base_url: get("OPENAI_BASE_URL"),

            port: get("PORT").unwrap_or_else(default_port),
            worker_count: get("WEBHOOK_WORKERS")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or_else(default_worker_count),
            queue_capacity: get("WEBHOOK_QUEUE_CAPACITY")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or_else(default_queue_capacity),
            debug_mode: get("DEBUG_MODE").is_some(),
        })
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Masks a secret for logging: first 7 chars + "***" + last 4 chars.
/// Anything of 11 chars or fewer is fully hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}
