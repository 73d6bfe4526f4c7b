//! Context retrieval from the external embeddings/vector-search service.
//!
//! The vector database and embedding model are black-box collaborators:
//! this module only speaks their HTTP interface. A failing provider is
//! never allowed to fail the request — every error is absorbed into an
//! empty snippet list.

use async_trait::async_trait;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Short TTL so repeated queries within a session skip the network hop
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 256;

/// Per-call timeout for the search service (it sits on the request path)
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One scored text snippet returned by the vector-search service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub score: f32,
}

/// Supplies relevant text snippets for a query
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Retrieve up to `k` snippets relevant to `query`. Implementations
    /// absorb their own failures: the result is empty on error, never Err.
    async fn retrieve(&self, user_id: &str, query: &str, k: usize) -> Vec<Snippet>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    text: String,
    #[serde(default)]
    similarity: f32,
}

/// HTTP client for the embeddings service's similarity-search endpoint
pub struct HttpContextProvider {
    base_url: String,
    endpoint: String,
    cache: Cache<String, Arc<Vec<Snippet>>>,
}

impl HttpContextProvider {
    pub fn new(base_url: &str, endpoint: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint: endpoint.to_string(),
            cache: Cache::builder()
                .time_to_live(CACHE_TTL)
                .max_capacity(CACHE_CAPACITY)
                .build(),
        }
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Snippet>, String> {
        let url = format!("{}{}", self.base_url, self.endpoint);
        let request = SearchRequest { query, k };

        let response = crate::http::shared_client()
            .post(&url)
            .timeout(SEARCH_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Search service returned {}", status));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse search response: {}", e))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| Snippet {
                text: r.text,
                score: r.similarity,
            })
            .collect())
    }
}

#[async_trait]
impl ContextProvider for HttpContextProvider {
    async fn retrieve(&self, user_id: &str, query: &str, k: usize) -> Vec<Snippet> {
        // user_id scopes logging only; the search service is not multi-tenant
        let cache_key = format!("{}:{}", k, query);
        if let Some(cached) = self.cache.get(&cache_key) {
            log::debug!("[RETRIEVAL] Cache hit for user {}", user_id);
            return cached.as_ref().clone();
        }

        match self.search(query, k).await {
            Ok(snippets) => {
                self.cache.insert(cache_key, Arc::new(snippets.clone()));
                snippets
            }
            Err(e) => {
                log::error!("[RETRIEVAL] Error retrieving context: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_absorbed_to_empty() {
        // Port 9 (discard) refuses connections immediately on test hosts
        let provider = HttpContextProvider::new("http://127.0.0.1:9", "/api/v1/search/");
        let snippets = provider.retrieve("user-1", "anything", 3).await;
        assert!(snippets.is_empty());
    }

    #[test]
    fn test_search_response_shape() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"results": [{"text": "snippet", "similarity": 0.87}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].text, "snippet");

        // Missing fields degrade gracefully rather than failing the decode
        let parsed: SearchResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.results.is_empty());
    }
}
