//! LINE Translator - Main Entry Point
//!
//! A webhook server that:
//! 1. Receives message events from the LINE Messaging API
//! 2. Translates text messages between English and Thai via OpenAI
//! 3. Replies to each message with the translation and a direction tag
//!
//! # Architecture
//!
//! ```text
//! LINE Platform ──HTTPS──▶ Webhook (this) ──▶ Event queue ──▶ Workers
//!       ▲                                                       │
//!       │                                                       ├── OpenAI (stream)
//!       └──────────────── Reply API ◀───────────────────────────┘
//! ```

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use line_translator::config::{BotConfig, mask_secret};
use line_translator::dispatcher::EventDispatcher;
use line_translator::line_api::LineApiClient;
use line_translator::pipeline::EventContext;
use line_translator::signature::LineSignature;
use line_translator::translator::OpenAiTranslator;
use line_translator::webhook::{self, HEALTH_PATH, WEBHOOK_PATH, WebhookState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,line_translator=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 LINE Translator starting...");

    // Load configuration
    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };
    info!(
        "📋 Configuration loaded (model={}, openai_key={})",
        config.openai_model,
        mask_secret(&config.openai_api_key)
    );

    // Initialize clients
    let line_client = LineApiClient::new(
        config.line_channel_token.clone(),
        config.line_api_base.clone(),
    )
    .map_err(|e| {
        error!("Failed to create LINE bot client: {:#}", e);
        e
    })?;

    let translator = OpenAiTranslator::new(
        &config.openai_api_key,
        config.openai_base_url.as_deref(),
        config.openai_model.clone(),
    );
    info!("🤖 OpenAI client initialized");

    // Create shared state
    let ctx = EventContext::new(Arc::new(translator), Arc::new(line_client));
    let dispatcher = EventDispatcher::start(ctx, config.worker_count, config.queue_capacity);

    let state = WebhookState {
        signature: LineSignature::new(config.line_channel_secret.clone()),
        dispatcher: dispatcher.clone(),
        debug_mode: config.debug_mode,
    };

    // Spawn webhook server
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid PORT: {}", config.port))?;
    let server = spawn_webhook_server(addr, state);

    info!("🌐 Server listening on {}", addr);
    info!("💬 LINE webhook endpoint: {}", WEBHOOK_PATH);
    info!("❤️ Health check endpoint: {}", HEALTH_PATH);

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    // Graceful shutdown
    info!("🛑 Shutting down...");
    server.abort();
    dispatcher.shutdown();

    info!("✅ LINE Translator stopped");
    Ok(())
}

/// Spawn the webhook HTTP server
fn spawn_webhook_server(addr: SocketAddr, state: WebhookState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = webhook::run_server(addr, state).await {
            error!("Webhook server error: {}", e);
            std::process::exit(1);
        }
    })
}
