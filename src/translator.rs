//! EN⇄TH translation through a streamed OpenAI chat completion
//!
//! The request is direction-agnostic: the system prompt tells the model to
//! detect the input language and invert it. The direction tag attached to the
//! result is derived from the input text alone (see [`Direction::for_input`]).

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, info, instrument};

use crate::language::Direction;

const SYSTEM_PROMPT: &str = "\
You are a strict EN⇄TH translator. Translate the USER message only.
If input is English, output natural Thai (male default: ครับ). If input is Thai, output natural English.
Never answer questions, never add greetings, never explain, never ask back.
Do not add tags, prefixes, brackets, or language labels.
If the input addresses \u{201c}ChatGPT\u{201d} or asks the assistant something, STILL translate it.
Output only the translation text, nothing else.";

/// (user, assistant) example turns sent ahead of every request
const FEW_SHOT: [(&str, &str); 3] = [
    ("สรุปแล้วพรุ่งนี้ว่างไหม", "So are you free tomorrow, then?"),
    ("hi chatgpt", "สวัสดี ChatGPT ครับ"),
    ("สวัสดีครับ", "Hello"),
];

/// Outcome of one translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub direction: Direction,
}

impl Translation {
    /// Reply text: `[<direction>] <text>`
    pub fn reply_text(&self) -> String {
        format!("[{}] {}", self.direction, self.text)
    }
}

/// Something that can translate a user message
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str) -> Result<Translation>;
}

/// Translator backed by the OpenAI chat completion API
#[derive(Clone)]
pub struct OpenAiTranslator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: &str, base_url: Option<&str>, model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    /// Build the streamed completion request for `text`
    pub fn build_request(&self, text: &str) -> Result<CreateChatCompletionRequest> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0_f32)
            .top_p(1.0_f32)
            .stream(true)
            .messages(build_messages(text)?)
            .build()
            .context("Failed to build chat completion request")
    }
}

#[async_trait]
impl Translate for OpenAiTranslator {
    #[instrument(skip_all, fields(model = %self.model, input_chars = text.chars().count()))]
    async fn translate(&self, text: &str) -> Result<Translation> {
        let request = self.build_request(text)?;

        debug!("Opening completion stream");
        let stream = self.client.chat().create_stream(request).await?;

        let fragments = stream.map(|chunk| {
            chunk.map(|response| {
                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .unwrap_or_default()
            })
        });
        let translated = collect_fragments(fragments).await?;

        let translation = Translation {
            text: translated.trim().to_string(),
            direction: Direction::for_input(text),
        };
        info!(
            "Translation complete ({}, {} chars)",
            translation.direction,
            translation.text.chars().count()
        );
        Ok(translation)
    }
}

/// System prompt, the few-shot turns, then the user's text as the final turn
pub fn build_messages(text: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> =
        Vec::with_capacity(2 + FEW_SHOT.len() * 2);

    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT.to_string())
            .build()?
            .into(),
    );

    for (user, assistant) in FEW_SHOT {
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()?
                .into(),
        );
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(assistant.to_string())
                .build()?
                .into(),
        );
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(text.to_string())
            .build()?
            .into(),
    );

    Ok(messages)
}

/// Concatenate streamed text fragments in arrival order.
///
/// Stops at the end of the stream; the first error aborts and is returned.
pub async fn collect_fragments<S, E>(mut stream: S) -> Result<String>
where
    S: Stream<Item = std::result::Result<String, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut out = String::new();
    while let Some(fragment) = stream.next().await {
        out.push_str(&fragment?);
    }
    Ok(out)
}
