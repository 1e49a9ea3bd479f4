//! Per-event processing: translate each text message and reply to it
//!
//! Every error below this point is absorbed here. A failed translation is
//! answered with a fixed error text; a failed reply is only logged.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::line_api::ReplySender;
use crate::translator::Translate;
use crate::types::Event;

/// Deadline for a single translation call
pub const TRANSLATION_DEADLINE: Duration = Duration::from_secs(30);

/// Reply sent when translation fails or times out
pub const TRANSLATION_ERROR_TEXT: &str = "❌ Translation error, please try again";

/// Shared, read-only dependencies of event processing
#[derive(Clone)]
pub struct EventContext {
    pub translator: Arc<dyn Translate>,
    pub replier: Arc<dyn ReplySender>,
    pub deadline: Duration,
}

impl EventContext {
    pub fn new(translator: Arc<dyn Translate>, replier: Arc<dyn ReplySender>) -> Self {
        Self {
            translator,
            replier,
            deadline: TRANSLATION_DEADLINE,
        }
    }
}

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a text message, or nothing to reply to
    Skipped,
    /// Translation sent
    Translated,
    /// Translation failed and the error text was sent
    TranslationFailed,
    /// The reply could not be delivered
    ReplyFailed,
}

/// Process events one at a time, in payload order
pub async fn process_events(ctx: &EventContext, events: &[Event]) -> Vec<EventOutcome> {
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        outcomes.push(process_event(ctx, event).await);
    }
    outcomes
}

/// Translate a single text-message event and reply to it
pub async fn process_event(ctx: &EventContext, event: &Event) -> EventOutcome {
    let Event::Message(message) = event else {
        debug!("Ignoring {} event", event.kind());
        return EventOutcome::Skipped;
    };
    let Some(text) = message.text() else {
        debug!("Ignoring non-text message");
        return EventOutcome::Skipped;
    };
    if message.is_standby() {
        debug!("Ignoring message received in standby mode");
        return EventOutcome::Skipped;
    }
    let Some(reply_token) = event.reply_token() else {
        debug!("Ignoring message without reply token");
        return EventOutcome::Skipped;
    };

    if let Some(sent_at) = message.sent_at() {
        let age_ms = (chrono::Utc::now() - sent_at).num_milliseconds();
        debug!("Processing text message sent {}ms ago", age_ms);
    }

    let translation = match timeout(ctx.deadline, ctx.translator.translate(text)).await {
        Ok(Ok(translation)) => translation,
        Ok(Err(e)) => {
            error!("Translation error: {:#}", e);
            return send_error_reply(ctx, reply_token).await;
        }
        Err(_) => {
            error!("Translation timed out after {}s", ctx.deadline.as_secs());
            return send_error_reply(ctx, reply_token).await;
        }
    };

    match ctx
        .replier
        .reply_text(reply_token, &translation.reply_text())
        .await
    {
        Ok(()) => {
            info!("Successfully sent translation ({})", translation.direction);
            EventOutcome::Translated
        }
        Err(e) => {
            warn!("Failed to send translation: {:#}", e);
            EventOutcome::ReplyFailed
        }
    }
}

async fn send_error_reply(ctx: &EventContext, reply_token: &str) -> EventOutcome {
    match ctx
        .replier
        .reply_text(reply_token, TRANSLATION_ERROR_TEXT)
        .await
    {
        Ok(()) => EventOutcome::TranslationFailed,
        Err(e) => {
            warn!("Failed to send error message: {:#}", e);
            EventOutcome::ReplyFailed
        }
    }
}
