//! Task classification: decide whether a request needs a tool-using agent
//! or a direct answer.

use crate::ai::{GenerateOptions, LanguageModel, Message};
use crate::models::RoutingDecision;
use crate::tools::ToolRegistry;
use once_cell::sync::Lazy;
use regex::Regex;

/// Classification runs colder than answer generation for consistency
const ROUTER_TEMPERATURE: f32 = 0.2;

/// Models often wrap their JSON in a markdown code fence
static JSON_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

pub struct TaskRouter {
    system_prompt: String,
}

impl TaskRouter {
    /// The routing prompt advertises whatever tools are registered, so new
    /// tools become routable without prompt edits.
    pub fn new(registry: &ToolRegistry) -> Self {
        let tool_lines = registry
            .get_tool_definitions()
            .iter()
            .enumerate()
            .map(|(i, def)| format!("{}. {}: {}", i + 1, def.name, def.description))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = format!(
            "You are an intelligent AI assistant that can both answer questions directly \
             and use specialized tools when needed.\n\n\
             Available Tools and their Capabilities:\n{}\n\n\
             Before responding, analyze if the question requires real-time data, current \
             information, or specialized tools.\n\
             If the question can be answered with your general knowledge, respond directly.\n\
             If tools are needed, specify which tool and why.\n\n\
             IMPORTANT: Your response must be valid JSON in the following format:\n\
             {{\n\
             \x20   \"requires_tool\": true/false,\n\
             \x20   \"tool_name\": \"name_of_tool_or_null\",\n\
             \x20   \"reasoning\": \"your explanation here\",\n\
             \x20   \"direct_response\": \"your response if no tool is needed or null\"\n\
             }}",
            tool_lines
        );

        Self { system_prompt }
    }

    /// Classify one request. Never fails: any model or parse error falls
    /// open to a tool-free direct answer.
    pub async fn route(&self, model: &dyn LanguageModel, input: &str) -> RoutingDecision {
        let messages = vec![
            Message::system(&self.system_prompt),
            Message::user(format!(
                "Question: {}\n\nAnalyze this question and decide how to respond.",
                input
            )),
        ];

        let options = GenerateOptions {
            temperature: Some(ROUTER_TEMPERATURE),
        };

        match model.generate(messages, options).await {
            Ok(text) => match parse_decision(&text) {
                Ok(decision) => {
                    log::info!("[ROUTER] Decision: {:?}", decision);
                    decision
                }
                Err(e) => {
                    log::error!("[ROUTER] {} Response: {}", e, text);
                    RoutingDecision::fallback("Error in analysis, falling back to direct response")
                }
            },
            Err(e) => {
                log::error!("[ROUTER] Model call failed: {}", e);
                RoutingDecision::fallback(format!("Unexpected error: {}", e))
            }
        }
    }
}

/// Decode the model's reply into a routing decision.
///
/// The reply is validated against the decision schema: missing required
/// keys or mistyped values are parse errors, not silently-defaulted fields.
pub(crate) fn parse_decision(text: &str) -> Result<RoutingDecision, String> {
    let trimmed = text.trim();
    let candidate = match JSON_FENCE_RE.captures(trimmed) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    };

    serde_json::from_str(candidate).map_err(|e| format!("Invalid routing JSON: {}", e))
}
