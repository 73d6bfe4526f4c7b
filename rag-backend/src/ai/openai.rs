//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/v1/chat/completions` wire format, so any OpenAI-compatible
//! endpoint works. Non-streaming calls retry transient failures with
//! exponential backoff; streaming calls parse the SSE `data:` frames and
//! forward content deltas as they arrive.

use crate::ai::{GenerateOptions, LanguageModel, Message, ModelFactory};
use crate::config::Config;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Retry configuration for transient errors on the non-streaming path
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

#[derive(Debug)]
pub struct OpenAiClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, endpoint: Option<&str>, model: Option<&str>) -> Result<Self, String> {
        if api_key.trim().is_empty() {
            return Err("OPENAI_API_KEY not found in environment variables".to_string());
        }

        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert(header::AUTHORIZATION, auth_value);

        Ok(Self {
            client: crate::http::shared_client().clone(),
            auth_headers,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(
        &self,
        messages: &[Message],
        options: GenerateOptions,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: self.max_tokens,
            stream,
        }
    }

    /// Extract a readable error message from an API error body
    fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(parsed) => format!("LLM API error ({}): {}", status, parsed.error.message),
            Err(_) => format!("LLM API error ({}): {}", status, body),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> Result<String, String> {
        let request = self.build_request(&messages, options, false);

        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!(
                    "[OPENAI] Retry attempt {}/{} after {}ms delay: {}",
                    attempt,
                    MAX_RETRIES,
                    delay_ms,
                    last_error
                );
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }

            let response = match self
                .client
                .post(&self.endpoint)
                .headers(self.auth_headers.clone())
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("Request failed: {}", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let data: ChatCompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| format!("Failed to parse LLM response: {}", e))?;
                return data
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| "LLM returned no content".to_string());
            }

            let body = response.text().await.unwrap_or_default();
            last_error = Self::api_error_message(status, &body);

            // Rate limits and server errors are worth retrying; anything
            // else (bad request, auth) will not improve on its own.
            if status.as_u16() != 429 && !status.is_server_error() {
                return Err(last_error);
            }
        }

        Err(last_error)
    }

    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, String> {
        let request = self.build_request(&messages, GenerateOptions::default(), true);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error_message(status, &body));
        }

        let mut full_text = String::new();
        let mut pending = String::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| format!("Stream read error: {}", e))?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE lines; a partial line stays in `pending`
            // until the next chunk completes it.
            while let Some(newline) = pending.find('\n') {
                let line = pending[..newline].trim_end_matches('\r').to_string();
                pending.drain(..=newline);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();

                if data == "[DONE]" {
                    return Ok(full_text);
                }

                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(parsed) => {
                        let Some(content) = parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.delta.content)
                        else {
                            continue;
                        };
                        full_text.push_str(&content);
                        if tokens.send(content).await.is_err() {
                            // Consumer went away; stop reading the wire.
                            return Ok(full_text);
                        }
                    }
                    Err(e) => {
                        log::debug!("[OPENAI] Skipping unparsable stream frame: {}", e);
                    }
                }
            }
        }

        Ok(full_text)
    }
}

/// Builds `OpenAiClient`s from service configuration, once per request
#[derive(Clone)]
pub struct OpenAiFactory {
    api_key: String,
    endpoint: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiFactory {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            endpoint: config.openai_endpoint.clone(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_response_tokens,
        }
    }
}

impl ModelFactory for OpenAiFactory {
    fn client(&self) -> Result<Arc<dyn LanguageModel>, String> {
        let client = OpenAiClient::new(&self.api_key, self.endpoint.as_deref(), Some(&self.model))?
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected_at_construction() {
        let err = OpenAiClient::new("", None, None).unwrap_err();
        assert!(err.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_request_serialization_omits_stream_false() {
        let client = OpenAiClient::new("test-key", None, Some("gpt-4o-mini")).unwrap();
        let request = client.build_request(
            &[Message::user("hi")],
            GenerateOptions::default(),
            false,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("stream").is_none());

        let streaming = client.build_request(&[Message::user("hi")], GenerateOptions::default(), true);
        let json = serde_json::to_value(&streaming).unwrap();
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_temperature_override() {
        let client = OpenAiClient::new("test-key", None, None)
            .unwrap()
            .with_temperature(0.9);
        let request = client.build_request(
            &[Message::user("hi")],
            GenerateOptions {
                temperature: Some(0.2),
            },
            false,
        );
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);

        let request = client.build_request(&[Message::user("hi")], GenerateOptions::default(), false);
        assert!((request.temperature - 0.9).abs() < f32::EPSILON);
    }
}
