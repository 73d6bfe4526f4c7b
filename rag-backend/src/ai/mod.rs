pub mod openai;
pub mod streaming;

#[cfg(test)]
pub mod mock;

pub use openai::{OpenAiClient, OpenAiFactory};
pub use streaming::{
    StreamEvent, StreamEventKind, StreamReceiver, StreamSender, ToolTrace, create_stream_channel,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Override the client's configured temperature (e.g. the router's
    /// low-temperature classification calls)
    pub temperature: Option<f32>,
}

/// A hosted language model, callable in request/response or streaming mode.
///
/// Components receive this as a constructor-supplied interface so tests can
/// substitute scripted implementations.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete response for the given conversation
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> Result<String, String>;

    /// Generate a response incrementally, forwarding each token into
    /// `tokens` as it arrives. Returns the full concatenated text.
    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, String>;
}

/// Builds a language-model client per request from configured settings.
///
/// Construction is the point where credentials are checked; a missing API
/// key surfaces here as a stage-fatal error rather than a startup panic.
pub trait ModelFactory: Send + Sync {
    fn client(&self) -> Result<Arc<dyn LanguageModel>, String>;
}
