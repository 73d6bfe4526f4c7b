//! Drives an agent runner, translating its raw token stream into typed
//! events and bounding the whole execution with a timeout.

use crate::ai::{StreamEvent, StreamSender, ToolTrace};
use crate::workflow::agent::AgentRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TOKEN_CHANNEL_BUFFER: usize = 64;

pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run the agent to completion, streaming its trace as events.
    ///
    /// Returns the final answer, or `None` after exactly one `error` event
    /// (timeout or agent failure) or a silent stop (client gone, cancelled).
    /// The runner task never outlives this call: every exit path aborts it.
    pub async fn execute(
        &self,
        runner: Arc<dyn AgentRunner>,
        input: String,
        events: &StreamSender,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_CHANNEL_BUFFER);

        let mut handle = tokio::spawn(async move { runner.run(input, token_tx).await });

        let mut trace = ToolTrace::new();
        loop {
            tokio::select! {
                maybe_token = token_rx.recv() => match maybe_token {
                    Some(token) => {
                        if let Some(event) = trace.push(&token) {
                            if events.send(event).await.is_err() {
                                // Client disconnected; stop the agent too
                                log::info!("[EXECUTOR] Event stream closed, aborting agent");
                                handle.abort();
                                cancel.cancel();
                                return None;
                            }
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    log::info!("[EXECUTOR] Cancelled, aborting agent");
                    handle.abort();
                    return None;
                }
            }
        }

        // Token channel closed: the runner is wrapping up. Bound the wait.
        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(answer))) => {
                let event = StreamEvent::agent_final(format!("\nFinal Answer: {}", answer));
                if events.send(event).await.is_err() {
                    cancel.cancel();
                    return None;
                }
                Some(answer)
            }
            Ok(Ok(Err(e))) => {
                log::error!("[EXECUTOR] Agent failed: {}", e);
                let _ = events
                    .send(StreamEvent::error(format!("\nError in final result: {}", e)))
                    .await;
                None
            }
            Ok(Err(join_error)) => {
                log::error!("[EXECUTOR] Agent task panicked: {}", join_error);
                let _ = events
                    .send(StreamEvent::error("\nError in final result: agent task failed"))
                    .await;
                None
            }
            Err(_) => {
                log::warn!("[EXECUTOR] Agent timed out after {:?}", self.timeout);
                // Tear down the runner and anything sharing its token
                handle.abort();
                cancel.cancel();
                let _ = events.send(StreamEvent::error("\nTask timed out")).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{StreamEventKind, create_stream_channel};
    use async_trait::async_trait;

    /// Streams a fixed token sequence, then resolves with an answer
    struct ScriptedRunner {
        tokens: Vec<String>,
        outcome: Result<String, String>,
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn run(
            &self,
            _input: String,
            tokens: mpsc::Sender<String>,
        ) -> Result<String, String> {
            for token in &self.tokens {
                let _ = tokens.send(token.clone()).await;
            }
            self.outcome.clone()
        }
    }

    /// Drops its token sender immediately, then never finishes
    struct StalledRunner;

    #[async_trait]
    impl AgentRunner for StalledRunner {
        async fn run(
            &self,
            _input: String,
            tokens: mpsc::Sender<String>,
        ) -> Result<String, String> {
            drop(tokens);
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    async fn drain(mut rx: crate::ai::StreamReceiver) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_trace_events_then_final_answer() {
        let runner = Arc::new(ScriptedRunner {
            tokens: vec![
                "thinking ".to_string(),
                "Action: get_time\n".to_string(),
                "Observation: 09:00 AM UTC\n".to_string(),
            ],
            outcome: Ok("It is 09:00 AM UTC.".to_string()),
        });

        let (tx, rx) = create_stream_channel(64);
        let cancel = CancellationToken::new();
        let executor = ToolExecutor::new(Duration::from_secs(5));

        let answer = executor.execute(runner, "time?".to_string(), &tx, &cancel).await;
        drop(tx);
        assert_eq!(answer.as_deref(), Some("It is 09:00 AM UTC."));

        let events = drain(rx).await;
        let kinds: Vec<StreamEventKind> = events.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&StreamEventKind::AgentThought));
        assert!(kinds.contains(&StreamEventKind::AgentAction));
        assert!(kinds.contains(&StreamEventKind::AgentObservation));
        assert_eq!(*kinds.last().unwrap(), StreamEventKind::AgentFinal);
        assert!(events.last().unwrap().text.contains("Final Answer: It is 09:00 AM UTC."));
    }

    #[tokio::test]
    async fn test_timeout_emits_exactly_one_error() {
        let (tx, rx) = create_stream_channel(64);
        let cancel = CancellationToken::new();
        let executor = ToolExecutor::new(Duration::from_millis(50));

        let answer = executor
            .execute(Arc::new(StalledRunner), "hang".to_string(), &tx, &cancel)
            .await;
        drop(tx);
        assert!(answer.is_none());
        // The timed-out runner's token was cancelled as part of teardown
        assert!(cancel.is_cancelled());

        let events = drain(rx).await;
        let errors: Vec<_> = events
            .iter()
            .filter(|e| e.kind == StreamEventKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_agent_failure_emits_error() {
        let runner = Arc::new(ScriptedRunner {
            tokens: vec![],
            outcome: Err("model exploded".to_string()),
        });

        let (tx, rx) = create_stream_channel(64);
        let cancel = CancellationToken::new();
        let executor = ToolExecutor::new(Duration::from_secs(5));

        let answer = executor.execute(runner, "q".to_string(), &tx, &cancel).await;
        drop(tx);
        assert!(answer.is_none());

        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StreamEventKind::Error);
        assert!(events[0].text.contains("model exploded"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_execution() {
        let (tx, _rx) = create_stream_channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let executor = ToolExecutor::new(Duration::from_millis(50));
        let answer = executor
            .execute(Arc::new(StalledRunner), "q".to_string(), &tx, &cancel)
            .await;
        assert!(answer.is_none());
    }
}
