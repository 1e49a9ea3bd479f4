//! LINE Translator Library
//!
//! A LINE bot that translates every text message between English and Thai.
//!
//! # Flow
//!
//! ```text
//! POST /line/webhook ─▶ verify x-line-signature ─▶ 200 OK
//!                                   │
//!                                   └─▶ event queue ─▶ worker: translate ─▶ reply
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Set environment variables
//! export LINE_CHANNEL_SECRET=your_channel_secret
//! export LINE_CHANNEL_TOKEN=your_channel_access_token
//! export OPENAI_API_KEY=sk-...
//! export PORT=8080                  # optional
//!
//! # Run
//! line-translator
//! ```
//!
//! Replies look like `[en→th] สวัสดีครับ` or `[th→en] Hello`.

pub mod config;
pub mod dispatcher;
pub mod language;
pub mod line_api;
pub mod pipeline;
pub mod signature;
pub mod translator;
pub mod types;
pub mod webhook;

pub use config::BotConfig;
pub use dispatcher::EventDispatcher;
pub use line_api::{LineApiClient, ReplySender};
pub use signature::LineSignature;
pub use translator::{OpenAiTranslator, Translate, Translation};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::BotConfig;
    pub use crate::language::{Direction, looks_thai};
    pub use crate::line_api::{LineApiClient, ReplySender};
    pub use crate::pipeline::{EventContext, EventOutcome};
    pub use crate::translator::{OpenAiTranslator, Translate, Translation};
    pub use crate::types::*;
}
