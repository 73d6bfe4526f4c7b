//! Search-query rewriting from conversational input.

use crate::ai::{GenerateOptions, LanguageModel, Message};
use crate::models::{Turn, TurnRole};

/// Only the most recent turns inform the rewrite; older context is noise
/// for search purposes.
pub const HISTORY_RECENCY_WINDOW: usize = 3;

/// Rewrites the user's conversational input into a standalone search query
pub struct QueryOptimizer;

impl QueryOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Produce the optimized query. This stage is on the critical path of
    /// the retrieval chain, so a model failure propagates to the caller.
    pub async fn optimize(
        &self,
        model: &dyn LanguageModel,
        current_input: &str,
        history: &[Turn],
    ) -> Result<String, String> {
        let prompt = build_prompt(current_input, history);
        let reply = model
            .generate(vec![Message::user(prompt)], GenerateOptions::default())
            .await?;

        let query = reply.trim();
        if query.is_empty() {
            // A blank rewrite would retrieve nothing useful; fall back to
            // the raw input.
            log::warn!("[OPTIMIZER] Empty rewrite, using raw input");
            Ok(current_input.to_string())
        } else {
            log::info!("[OPTIMIZER] Optimized query: {}", query);
            Ok(query.to_string())
        }
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_prompt(current_input: &str, history: &[Turn]) -> String {
    format!(
        "Based on the following chat history and current input, generate an optimized search query:\n\n\
         Chat History:\n{}\n\n\
         Current Input: {}\n\n\
         Generate a concise search query that captures the essential information needs.",
        format_chat_history(history),
        current_input
    )
}

fn format_chat_history(history: &[Turn]) -> String {
    let start = history.len().saturating_sub(HISTORY_RECENCY_WINDOW);
    history[start..]
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::User => "User",
                TurnRole::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockLanguageModel;

    #[test]
    fn test_prompt_keeps_only_recent_turns() {
        let history = vec![
            Turn::user("ancient question"),
            Turn::assistant("ancient answer"),
            Turn::user("what is rust"),
            Turn::assistant("a systems language"),
            Turn::user("who created it"),
        ];

        let prompt = build_prompt("when was 1.0 released", &history);
        assert!(!prompt.contains("ancient"));
        assert!(prompt.contains("User: what is rust"));
        assert!(prompt.contains("Assistant: a systems language"));
        assert!(prompt.contains("User: who created it"));
        assert!(prompt.contains("Current Input: when was 1.0 released"));
    }

    #[tokio::test]
    async fn test_optimize_trims_reply() {
        let model = MockLanguageModel::new(vec![Ok("  rust 1.0 release date \n".to_string())]);
        let query = QueryOptimizer::new()
            .optimize(&model, "when was it released", &[])
            .await
            .unwrap();
        assert_eq!(query, "rust 1.0 release date");
    }

    #[tokio::test]
    async fn test_empty_rewrite_falls_back_to_raw_input() {
        let model = MockLanguageModel::new(vec![Ok("   ".to_string())]);
        let query = QueryOptimizer::new()
            .optimize(&model, "original question", &[])
            .await
            .unwrap();
        assert_eq!(query, "original question");
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = MockLanguageModel::new(vec![Err("down".to_string())]);
        let result = QueryOptimizer::new().optimize(&model, "q", &[]).await;
        assert!(result.is_err());
    }
}
