//! ReAct-style agent loop: alternate model turns with tool executions
//! until the model produces a final answer or the iteration cap is hit.

use crate::ai::{LanguageModel, Message};
use crate::tools::{ToolContext, ToolRegistry};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hard cap on tool-using turns per request
pub const MAX_AGENT_ITERATIONS: usize = 3;

static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Action:\s*([A-Za-z0-9_]+)").expect("valid regex"));
static ACTION_INPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action Input:\s*(.+?)(?:\nObservation:|\z)").expect("valid regex")
});
static FINAL_ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Final Answer:\s*(.+)\z").expect("valid regex"));

/// Something that can run an agent task, streaming its raw tokens out as it
/// works and returning the final answer text.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, input: String, tokens: mpsc::Sender<String>) -> Result<String, String>;
}

#[derive(Debug, PartialEq)]
struct ParsedAction {
    tool: String,
    input: Value,
}

/// The default agent runner: a text-delimited tool loop over the registry
pub struct ReactAgentLoop {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl ReactAgentLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        context: ToolContext,
    ) -> Self {
        Self {
            model,
            registry,
            context,
        }
    }

    fn system_prompt(&self) -> String {
        let definitions = self.registry.get_tool_definitions();
        let tool_lines = definitions
            .iter()
            .map(|def| format!("{}: {}", def.name, def.description))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = definitions
            .iter()
            .map(|def| def.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "You are a helpful AI assistant that can use tools to get information and help users.\n\
             Always think step by step about what tools you need to use to help the user.\n\
             If you don't know something or if a tool fails, please say so.\n\n\
             You have access to the following tools:\n{}\n\n\
             To use a tool, please use the following format:\n\
             Action: the action to take, should be one of [{}]\n\
             Action Input: the input to the action, as a JSON object\n\
             Observation: the result of the action\n\n\
             When you have a final response to say to the Human, or if you do not need to \
             use a tool, you MUST use the format:\n\
             Final Answer: [your response here]",
            tool_lines, tool_names
        )
    }
}

#[async_trait]
impl AgentRunner for ReactAgentLoop {
    async fn run(&self, input: String, tokens: mpsc::Sender<String>) -> Result<String, String> {
        let system = self.system_prompt();
        let mut scratchpad = String::new();

        for iteration in 1..=MAX_AGENT_ITERATIONS {
            log::info!("[AGENT] Iteration {}/{}", iteration, MAX_AGENT_ITERATIONS);

            let user_content = if scratchpad.is_empty() {
                input.clone()
            } else {
                format!("{}\n\n{}", input, scratchpad)
            };
            let messages = vec![Message::system(&system), Message::user(user_content)];

            let text = self
                .model
                .generate_stream(messages, tokens.clone())
                .await?;

            if let Some(answer) = extract_final_answer(&text) {
                return Ok(answer);
            }

            let Some(action) = parse_action(&text) else {
                // No tool call and no Final Answer marker: the model chose
                // to answer in plain text.
                return Ok(text.trim().to_string());
            };

            let result = self
                .registry
                .execute(&action.tool, action.input, &self.context)
                .await;
            let observation_line = format!("\nObservation: {}\n", result.observation());

            if tokens.send(observation_line.clone()).await.is_err() {
                return Err("Token stream closed".to_string());
            }

            scratchpad.push_str(text.trim_end());
            scratchpad.push_str(&observation_line);
        }

        // Out of iterations: one last tool-free turn to wrap up with what
        // was gathered, rather than returning nothing.
        log::warn!("[AGENT] Iteration limit reached, generating final answer");
        let messages = vec![
            Message::system(&system),
            Message::user(format!(
                "{}\n\n{}\nYou have used the maximum number of tool calls. \
                 Give your Final Answer now using the information gathered so far.",
                input, scratchpad
            )),
        ];
        let text = self.model.generate_stream(messages, tokens).await?;
        Ok(extract_final_answer(&text).unwrap_or_else(|| text.trim().to_string()))
    }
}

fn extract_final_answer(text: &str) -> Option<String> {
    FINAL_ANSWER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_action(text: &str) -> Option<ParsedAction> {
    let tool = ACTION_RE.captures(text)?.get(1)?.as_str().to_string();
    let raw = ACTION_INPUT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or("");

    // Non-JSON input still reaches the tool; most tools take a single query
    // argument, and the rest reject it with an observation the model can
    // correct on the next turn.
    let input =
        serde_json::from_str(raw).unwrap_or_else(|_| json!({ "query": raw }));

    Some(ParsedAction { tool, input })
}
