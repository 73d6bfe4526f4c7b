use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

/// One immutable turn in a conversation, oldest-first per conversation id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request aggregate fed to the answer generator; never persisted
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub history: Vec<Turn>,
    pub current_input: String,
    pub retrieved: Vec<String>,
}

/// The task router's classification output.
///
/// Decoded strictly from the model's JSON reply: `requires_tool` and
/// `reasoning` are required, so a missing key or wrong value type fails the
/// parse and triggers the fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub requires_tool: bool,
    #[serde(default)]
    pub tool_name: Option<String>,
    pub reasoning: String,
    #[serde(default)]
    pub direct_response: Option<String>,
}

impl RoutingDecision {
    /// Conservative fail-open fallback: favor a direct, tool-free answer
    /// over aborting the request.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            requires_tool: false,
            tool_name: None,
            reasoning: reasoning.into(),
            direct_response: None,
        }
    }
}
