//! The stream orchestrator: one request in, one ordered event stream out.
//!
//! Every pipeline stage reports progress through the same event channel the
//! client is reading from. Collaborator failures split into three classes:
//! absorbed (history read, retrieval), stage-fatal (model construction,
//! query optimization) which end the stream with a single `error` event and
//! persist nothing, and bounded (answer generation, tool execution) which
//! emit their error event and fall through to the persistence step.

use crate::ai::{ModelFactory, StreamEvent, StreamReceiver, StreamSender, create_stream_channel};
use crate::config::Config;
use crate::history::HistoryStore;
use crate::models::{ContextBundle, Turn};
use crate::retrieval::ContextProvider;
use crate::tools::ToolRegistry;
use crate::workflow::generator::{AnswerGenerator, GenerationContext, build_generator};
use crate::workflow::optimizer::QueryOptimizer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const EVENT_CHANNEL_BUFFER: usize = 32;

/// One chat request entering the pipeline
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user_id: String,
    /// Absent for the first message of a new conversation
    pub conversation_id: Option<String>,
    pub input: String,
}

pub struct StreamOrchestrator {
    factory: Arc<dyn ModelFactory>,
    history: Arc<dyn HistoryStore>,
    retrieval: Arc<dyn ContextProvider>,
    optimizer: QueryOptimizer,
    generator: Arc<dyn AnswerGenerator>,
    retrieval_k: usize,
    history_window: Option<usize>,
}

impl StreamOrchestrator {
    pub fn new(
        config: &Config,
        factory: Arc<dyn ModelFactory>,
        history: Arc<dyn HistoryStore>,
        retrieval: Arc<dyn ContextProvider>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            factory,
            history,
            retrieval,
            optimizer: QueryOptimizer::new(),
            generator: build_generator(config, registry),
            retrieval_k: config.retrieval_k,
            history_window: config.history_window,
        }
    }

    /// Start processing a request. Returns the resolved conversation id and
    /// the event stream; processing runs until completion or until the
    /// receiver is dropped.
    pub fn run(self: &Arc<Self>, request: ChatRequest) -> (String, StreamReceiver) {
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (events, receiver) = create_stream_channel(EVENT_CHANNEL_BUFFER);
        let orchestrator = Arc::clone(self);
        let conversation = conversation_id.clone();
        tokio::spawn(async move {
            orchestrator.process(request, conversation, events).await;
        });

        (conversation_id, receiver)
    }

    async fn process(self: Arc<Self>, request: ChatRequest, conversation_id: String, events: StreamSender) {
        let cancel = CancellationToken::new();
        // Cancels any in-flight child work when this task exits, on every
        // path including panics.
        let _guard = cancel.clone().drop_guard();

        log::info!(
            "[ORCHESTRATOR] Processing request for conversation {}",
            conversation_id
        );

        if !emit(
            &events,
            StreamEvent::system(format!(
                "Starting request processing (conversation {})...",
                conversation_id
            )),
        )
        .await
        {
            return;
        }

        // History is best-effort context: an unreadable store degrades the
        // answer, it does not fail the request.
        let mut history = match self.history.read(&conversation_id).await {
            Ok(turns) => turns,
            Err(e) => {
                log::error!("[ORCHESTRATOR] {}", e);
                Vec::new()
            }
        };
        if let Some(window) = self.history_window {
            let start = history.len().saturating_sub(window);
            history.drain(..start);
        }

        // Model construction is where missing credentials surface
        let model = match self.factory.client() {
            Ok(model) => model,
            Err(e) => {
                log::error!("[ORCHESTRATOR] Model construction failed: {}", e);
                let _ = events.send(StreamEvent::error(format!("Error: {}", e))).await;
                return;
            }
        };

        if !emit(&events, StreamEvent::system("Optimizing search query...")).await {
            return;
        }
        let optimized = match self
            .optimizer
            .optimize(model.as_ref(), &request.input, &history)
            .await
        {
            Ok(query) => query,
            Err(e) => {
                // The rest of the pipeline needs a search query; end the
                // stream without persisting a half-processed exchange.
                log::error!("[ORCHESTRATOR] Query optimization failed: {}", e);
                let _ = events.send(StreamEvent::error(format!("Error: {}", e))).await;
                return;
            }
        };

        if !emit(&events, StreamEvent::system("Retrieving relevant context...")).await {
            return;
        }
        let snippets = self
            .retrieval
            .retrieve(&request.user_id, &optimized, self.retrieval_k)
            .await;
        log::info!("[ORCHESTRATOR] Retrieved {} context snippets", snippets.len());

        let bundle = ContextBundle {
            history,
            current_input: request.input.clone(),
            retrieved: snippets.into_iter().map(|s| s.text).collect(),
        };
        let ctx = GenerationContext {
            user_id: request.user_id.clone(),
            conversation_id: conversation_id.clone(),
            cancel,
        };

        let answer = match self.generator.generate(model, &bundle, &ctx, &events).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("[ORCHESTRATOR] Generation failed: {}", e);
                let _ = events.send(StreamEvent::error(format!("Error: {}", e))).await;
                String::new()
            }
        };

        // Persist the exchange regardless of how the answer stage fared;
        // a failed answer is an empty assistant turn, keeping the
        // user/assistant alternation intact.
        if let Err(e) = self
            .history
            .append(&conversation_id, Turn::user(&request.input))
            .await
        {
            log::error!("[ORCHESTRATOR] {}", e);
        }
        if let Err(e) = self
            .history
            .append(&conversation_id, Turn::assistant(answer))
            .await
        {
            log::error!("[ORCHESTRATOR] {}", e);
        }

        log::info!(
            "[ORCHESTRATOR] Finished request for conversation {}",
            conversation_id
        );
    }
}

/// Send one event; false means the client is gone and processing should stop
async fn emit(events: &StreamSender, event: StreamEvent) -> bool {
    events.send(event).await.is_ok()
}
