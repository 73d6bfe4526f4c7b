//! Search and analysis tools.
//!
//! `search_docs` is backed by the same context provider the answer chain
//! uses. `analyze_sentiment` is a lightweight lexicon heuristic and
//! `web_search` is a stub that reports no live results.

use crate::retrieval::ContextProvider;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

fn query_schema(description: &str) -> ToolInputSchema {
    let mut properties = HashMap::new();
    properties.insert(
        "query".to_string(),
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.to_string(),
        },
    );
    ToolInputSchema {
        schema_type: "object".to_string(),
        properties,
        required: vec!["query".to_string()],
    }
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    query: String,
}

/// Document search over the indexed corpus
pub struct SearchDocsTool {
    retrieval: Arc<dyn ContextProvider>,
    k: usize,
}

impl SearchDocsTool {
    pub fn new(retrieval: Arc<dyn ContextProvider>, k: usize) -> Self {
        Self { retrieval, k }
    }
}

#[async_trait]
impl Tool for SearchDocsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_docs".to_string(),
            description: "Search through documents for relevant information".to_string(),
            input_schema: query_schema("The search query"),
        }
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: QueryParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let snippets = self
            .retrieval
            .retrieve(&context.user_id, &params.query, self.k)
            .await;

        if snippets.is_empty() {
            return ToolResult::success(format!(
                "No relevant documents found for: {}",
                params.query
            ));
        }

        let body = snippets
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.text))
            .collect::<Vec<_>>()
            .join("\n");
        ToolResult::success(format!(
            "Found relevant information for: {}\n{}",
            params.query, body
        ))
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "happy", "love", "wonderful", "fantastic", "amazing", "best",
    "glad",
];
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "sad", "hate", "horrible", "worst", "angry", "disappointed",
    "poor",
];

/// Coarse sentiment classification of a text
pub struct AnalyzeSentimentTool;

#[async_trait]
impl Tool for AnalyzeSentimentTool {
    fn definition(&self) -> ToolDefinition {
        let mut properties = HashMap::new();
        properties.insert(
            "text".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "The text to analyze".to_string(),
            },
        );
        ToolDefinition {
            name: "analyze_sentiment".to_string(),
            description: "Analyze the sentiment of a given text".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec!["text".to_string()],
            },
        }
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        #[derive(Deserialize)]
        struct TextParams {
            text: String,
        }

        let params: TextParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let lower = params.text.to_lowercase();
        let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();

        let verdict = if positive > negative {
            "positive"
        } else if negative > positive {
            "negative"
        } else {
            "neutral"
        };
        ToolResult::success(format!("The sentiment appears to be {}.", verdict))
    }
}

/// Web search placeholder.
/// TODO: wire up a real search API (e.g. Brave or SerpApi) once a key is provisioned.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the internet for recent or specific information".to_string(),
            input_schema: query_schema("The search query"),
        }
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: QueryParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        ToolResult::success(format!(
            "Web search is not available in this deployment; no live results for: {}",
            params.query
        ))
    }
}
