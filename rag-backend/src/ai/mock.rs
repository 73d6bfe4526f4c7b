//! Scripted language-model doubles for tests.

use crate::ai::{GenerateOptions, LanguageModel, Message, ModelFactory};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A language model that replays a fixed script of responses, in order.
///
/// Both `generate` and `generate_stream` consume from the same script, so a
/// test's script order matches the pipeline's call order. Streaming replies
/// are chopped into word-sized tokens to exercise token-path consumers.
pub struct MockLanguageModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLanguageModel {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn next_response(&self, messages: Vec<Message>) -> Result<String, String> {
        self.calls.lock().push(messages);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("MockLanguageModel script exhausted".to_string()))
    }

    /// The message lists received so far, in call order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _options: GenerateOptions,
    ) -> Result<String, String> {
        self.next_response(messages)
    }

    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, String> {
        let text = self.next_response(messages)?;
        for piece in text.split_inclusive(' ') {
            if tokens.send(piece.to_string()).await.is_err() {
                break;
            }
        }
        Ok(text)
    }
}

/// Factory handing out a pre-built (usually mock) client
pub struct FixedModelFactory {
    model: Arc<dyn LanguageModel>,
}

impl FixedModelFactory {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

impl ModelFactory for FixedModelFactory {
    fn client(&self) -> Result<Arc<dyn LanguageModel>, String> {
        Ok(self.model.clone())
    }
}

/// Factory that always fails construction (missing-credential scenarios)
pub struct FailingModelFactory {
    message: String,
}

impl FailingModelFactory {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ModelFactory for FailingModelFactory {
    fn client(&self) -> Result<Arc<dyn LanguageModel>, String> {
        Err(self.message.clone())
    }
}
