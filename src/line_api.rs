//! LINE Messaging API client
//!
//! Only the reply endpoint is used: every inbound event carries a one-time
//! reply token that addresses exactly one reply to its conversation.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::mask_secret;
use crate::types::{LineApiError, ReplyMessageRequest};

// =============================================================================
// API Endpoints
// =============================================================================

const REPLY_PATH: &str = "/v2/bot/message/reply";

/// Delivers reply messages to the originating conversation
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Reply with a single text message using the event's reply token
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()>;
}

// =============================================================================
// LINE API Client
// =============================================================================

/// LINE Messaging API client
#[derive(Clone)]
pub struct LineApiClient {
    channel_token: String,
    api_base: String,
    http_client: Client,
}

impl LineApiClient {
    /// Create a new LINE API client
    pub fn new(channel_token: String, api_base: impl Into<String>) -> Result<Self> {
        if channel_token.is_empty() {
            return Err(anyhow!("LINE channel access token is empty"));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build LINE HTTP client")?;

        let api_base = api_base.into().trim_end_matches('/').to_string();
        debug!(
            "LINE API client ready: base={}, token={}",
            api_base,
            mask_secret(&channel_token)
        );

        Ok(Self {
            channel_token,
            api_base,
            http_client,
        })
    }

    /// Send a reply message
    pub async fn reply_message(&self, request: &ReplyMessageRequest) -> Result<()> {
        let url = format!("{}{}", self.api_base, REPLY_PATH);

        debug!(
            "Sending reply with {} message(s), reply_token={}",
            request.messages.len(),
            request.reply_token
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.channel_token)
            .json(request)
            .send()
            .await
            .context("Failed to send reply request")?;

        let status = response.status();
        if status.is_success() {
            info!("Reply delivered, reply_token={}", request.reply_token);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<LineApiError>(&body) {
            Ok(err) => {
                let details: Vec<String> = err
                    .details
                    .iter()
                    .filter_map(|d| match (&d.property, &d.message) {
                        (Some(p), Some(m)) => Some(format!("{}: {}", p, m)),
                        (None, Some(m)) => Some(m.clone()),
                        _ => None,
                    })
                    .collect();
                if details.is_empty() {
                    err.message
                } else {
                    format!("{} ({})", err.message, details.join("; "))
                }
            }
            Err(_) => body,
        };

        warn!("LINE reply API error: {} - {}", status, reason);
        Err(anyhow!("LINE reply API error {}: {}", status.as_u16(), reason))
    }
}

#[async_trait]
impl ReplySender for LineApiClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()> {
        self.reply_message(&ReplyMessageRequest::text(reply_token, text))
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================
