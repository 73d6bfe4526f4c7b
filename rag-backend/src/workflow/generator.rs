//! Answer generation strategies.
//!
//! The two strategies are interchangeable behind one trait, selected at
//! construction time. Direct classifies each request and may hand off to
//! the tool-using agent; context-chain always runs a single
//! stuffed-context pass with no routing.

use crate::ai::{LanguageModel, Message, StreamEvent, StreamSender};
use crate::config::Config;
use crate::models::{ContextBundle, TurnRole};
use crate::tools::{ToolContext, ToolRegistry};
use crate::workflow::agent::ReactAgentLoop;
use crate::workflow::executor::ToolExecutor;
use crate::workflow::router::TaskRouter;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TOKEN_CHANNEL_BUFFER: usize = 64;

/// Which answer generator the service runs with, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorStrategy {
    /// Classify first; answer directly or dispatch to the tool agent
    #[default]
    Direct,
    /// Always a single context-stuffed answer pass, never any tools
    ContextChain,
}

impl GeneratorStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(GeneratorStrategy::Direct),
            "context_chain" | "context-chain" => Some(GeneratorStrategy::ContextChain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorStrategy::Direct => "direct",
            GeneratorStrategy::ContextChain => "context_chain",
        }
    }
}

/// Request-scoped identifiers and the cancellation token shared with any
/// child work the generator spawns
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub user_id: String,
    pub conversation_id: String,
    pub cancel: CancellationToken,
}

/// Produces the assistant's answer for one request, emitting its own
/// progress events, and returns the full answer text for persistence.
///
/// A bounded failure (tool timeout, missing tool name) is reported in-band
/// by the generator itself and surfaces as an empty answer, not an `Err`.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        model: Arc<dyn LanguageModel>,
        bundle: &ContextBundle,
        ctx: &GenerationContext,
        events: &StreamSender,
    ) -> Result<String, String>;
}

/// Select and build the generator for the configured strategy
pub fn build_generator(config: &Config, registry: Arc<ToolRegistry>) -> Arc<dyn AnswerGenerator> {
    match config.answer_strategy {
        GeneratorStrategy::Direct => Arc::new(DirectGenerator::new(
            registry,
            Duration::from_secs(config.agent_timeout_secs),
        )),
        GeneratorStrategy::ContextChain => Arc::new(ContextChainGenerator),
    }
}

/// Stream one context-grounded answer pass, forwarding each token as an
/// `assistant` event. Returns the full concatenated text.
async fn stream_grounded_answer(
    model: Arc<dyn LanguageModel>,
    bundle: &ContextBundle,
    events: &StreamSender,
) -> Result<String, String> {
    let mut messages = vec![Message::system(
        "You are a helpful AI assistant. Provide accurate and relevant information based on the given context.",
    )];
    messages.extend(bundle.history.iter().map(|turn| match turn.role {
        TurnRole::User => Message::user(&turn.content),
        TurnRole::Assistant => Message::assistant(&turn.content),
    }));
    messages.push(Message::user(format!(
        "Context: {}\n\nQuestion: {}",
        bundle.retrieved.join(" "),
        bundle.current_input
    )));

    let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_CHANNEL_BUFFER);

    let forward = {
        let events = events.clone();
        tokio::spawn(async move {
            while let Some(token) = token_rx.recv().await {
                if events.send(StreamEvent::assistant(token)).await.is_err() {
                    break;
                }
            }
        })
    };

    let result = model.generate_stream(messages, token_tx).await;
    // The sender was moved into generate_stream and dropped when it
    // returned, so the forward task always terminates here.
    let _ = forward.await;
    result
}

/// Routing-first strategy: classify, then answer directly or via the agent
pub struct DirectGenerator {
    router: TaskRouter,
    executor: ToolExecutor,
    registry: Arc<ToolRegistry>,
}

impl DirectGenerator {
    pub fn new(registry: Arc<ToolRegistry>, agent_timeout: Duration) -> Self {
        Self {
            router: TaskRouter::new(&registry),
            executor: ToolExecutor::new(agent_timeout),
            registry,
        }
    }
}

#[async_trait]
impl AnswerGenerator for DirectGenerator {
    async fn generate(
        &self,
        model: Arc<dyn LanguageModel>,
        bundle: &ContextBundle,
        ctx: &GenerationContext,
        events: &StreamSender,
    ) -> Result<String, String> {
        if events.send(StreamEvent::system("Analyzing query...")).await.is_err() {
            return Err("Event stream closed".to_string());
        }

        let decision = self.router.route(model.as_ref(), &bundle.current_input).await;

        if events
            .send(StreamEvent::analysis(format!(
                "\nReasoning: {}",
                decision.reasoning
            )))
            .await
            .is_err()
        {
            return Err("Event stream closed".to_string());
        }

        if decision.requires_tool {
            let Some(tool_name) = decision.tool_name.as_deref().filter(|t| !t.is_empty()) else {
                // Bounded failure: the classification asked for a tool but
                // named none; report it and leave the answer empty.
                let _ = events
                    .send(StreamEvent::error("Error: No tool specified"))
                    .await;
                return Ok(String::new());
            };

            if events
                .send(StreamEvent::system(format!("\nUsing tool: {}", tool_name)))
                .await
                .is_err()
            {
                return Err("Event stream closed".to_string());
            }
            if events
                .send(StreamEvent::system("Executing agent tasks..."))
                .await
                .is_err()
            {
                return Err("Event stream closed".to_string());
            }

            let runner = Arc::new(ReactAgentLoop::new(
                model,
                self.registry.clone(),
                ToolContext {
                    user_id: ctx.user_id.clone(),
                    conversation_id: ctx.conversation_id.clone(),
                },
            ));
            let answer = self
                .executor
                .execute(runner, bundle.current_input.clone(), events, &ctx.cancel)
                .await;
            return Ok(answer.unwrap_or_default());
        }

        if let Some(direct) = decision
            .direct_response
            .as_deref()
            .filter(|r| !r.trim().is_empty())
        {
            // The router already wrote the answer; no second model call
            if events.send(StreamEvent::agent_final(direct)).await.is_err() {
                return Err("Event stream closed".to_string());
            }
            return Ok(direct.to_string());
        }

        if events
            .send(StreamEvent::system("\nGenerating response..."))
            .await
            .is_err()
        {
            return Err("Event stream closed".to_string());
        }
        stream_grounded_answer(model, bundle, events).await
    }
}

/// Routing-free strategy: one stuffed-context pass per request
pub struct ContextChainGenerator;

#[async_trait]
impl AnswerGenerator for ContextChainGenerator {
    async fn generate(
        &self,
        model: Arc<dyn LanguageModel>,
        bundle: &ContextBundle,
        _ctx: &GenerationContext,
        events: &StreamSender,
    ) -> Result<String, String> {
        if events
            .send(StreamEvent::system("\nGenerating response..."))
            .await
            .is_err()
        {
            return Err("Event stream closed".to_string());
        }
        stream_grounded_answer(model, bundle, events).await
    }
}
