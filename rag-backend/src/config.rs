use crate::workflow::GeneratorStrategy;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    // LLM settings
    pub openai_api_key: String,
    pub openai_endpoint: Option<String>,
    pub model_name: String,
    pub temperature: f32,
    pub max_response_tokens: u32,

    // Embedding/vector-search service (external collaborator)
    pub embedding_service_url: String,
    pub embedding_service_endpoint: String,
    pub retrieval_k: usize,

    // Workflow settings
    pub answer_strategy: GeneratorStrategy,
    /// How many history turns the answer pass may see (None = full history)
    pub history_window: Option<usize>,
    pub agent_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "./.db/rag.db".to_string()),
            // Not required at startup: a missing key surfaces per request as
            // a stage-fatal error event rather than a boot failure.
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_endpoint: env::var("OPENAI_ENDPOINT").ok(),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            temperature: env::var("TEMPERATURE")
                .unwrap_or_else(|_| "0.7".to_string())
                .parse()
                .expect("TEMPERATURE must be a valid number"),
            max_response_tokens: env::var("MAX_RESPONSE_TOKENS")
                .unwrap_or_else(|_| "4096".to_string())
                .parse()
                .expect("MAX_RESPONSE_TOKENS must be a valid number"),
            embedding_service_url: env::var("EMBEDDING_SERVICE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8001".to_string()),
            embedding_service_endpoint: env::var("EMBEDDING_SERVICE_ENDPOINT")
                .unwrap_or_else(|_| "/api/v1/search/".to_string()),
            retrieval_k: env::var("RETRIEVAL_K")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("RETRIEVAL_K must be a valid number"),
            answer_strategy: env::var("ANSWER_STRATEGY")
                .ok()
                .and_then(|v| GeneratorStrategy::from_str(&v))
                .unwrap_or_default(),
            history_window: env::var("HISTORY_WINDOW")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0),
            agent_timeout_secs: env::var("AGENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("AGENT_TIMEOUT_SECS must be a valid number"),
        }
    }
}
