//! Text generation: the two-argument contract the router depends on.
//!
//! The router asks for text in a `Style`; how that maps to system prompts,
//! token budgets and timeouts is decided here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// What kind of text the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Short conversational answer for the messaging channel.
    Chat,
    /// Body of an outgoing email reply.
    EmailReply,
}

impl Style {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::EmailReply => "email_reply",
        }
    }
}

/// Free-text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, style: Style, prompt: &str) -> Result<String, LlmError>;
}

/// Configuration for `LlmTextGenerator`.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Max tokens for a chat answer (kept small: it goes to a phone).
    pub chat_max_tokens: u32,
    /// Max tokens for an email body.
    pub reply_max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on a single generation call.
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            chat_max_tokens: 300,
            reply_max_tokens: 600,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

/// `TextGenerator` backed by an `LlmProvider`.
pub struct LlmTextGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl LlmTextGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    fn build_request(&self, style: Style, prompt: &str) -> CompletionRequest {
        let (system, max_tokens) = match style {
            Style::Chat => (CHAT_SYSTEM_PROMPT, self.config.chat_max_tokens),
            Style::EmailReply => (EMAIL_REPLY_SYSTEM_PROMPT, self.config.reply_max_tokens),
        };
        CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(prompt)])
            .with_temperature(self.config.temperature)
            .with_max_tokens(max_tokens)
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, style: Style, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(style, prompt);
        debug!(style = style.label(), model = self.llm.model_name(), "Generating text");

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| {
                warn!(style = style.label(), "Text generation timed out");
                LlmError::Timeout {
                    provider: self.llm.model_name().to_string(),
                    timeout: self.config.timeout,
                }
            })??;

        Ok(match style {
            Style::Chat => response.content,
            Style::EmailReply => response.content.trim().to_string(),
        })
    }
}

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant reachable over WhatsApp. \
     Answer in a few short sentences of plain text (no markdown headings). \
     If the user seems to want something done with their email, remind them of the \
     commands: 'email: read inbox', 'email: summarize inbox', 'reply [number] [message]', \
     'delete spam', 'label [number] [label]'.";

const EMAIL_REPLY_SYSTEM_PROMPT: &str = "You write email replies on behalf of the user. \
     Output only the email body: no subject line, no placeholders in brackets, no commentary. \
     Keep it concise and faithful to what the user asked to say.";
