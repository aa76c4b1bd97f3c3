//! Ollama chat backend for AI search.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use hoai_core::{AiSearchBackend, AiSearchResult, Error, Result};

use crate::normalize::normalize_response;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = hoai_core::defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = hoai_core::defaults::GEN_MODEL;

/// Timeout for search requests (seconds).
pub const SEARCH_TIMEOUT_SECS: u64 = hoai_core::defaults::SEARCH_TIMEOUT_SECS;

/// Instructions sent as the system message of every search.
pub const SYSTEM_PROMPT: &str = "Du bist ein Fachassistent für Architektur- und \
Ingenieurbüros in Deutschland (HOAI, Vergaberecht, Bauordnungsrecht). \
Beantworte die Frage des Nutzers sachlich und auf Deutsch. \
Antworte ausschließlich mit einem JSON-Objekt der Form \
{\"title\": string, \"content\": string, \"sources\": [{\"uri\": string, \"title\": string}]}. \
\"content\" darf einfaches HTML enthalten. Gib nur Quellen an, deren URL du kennst.";

/// AI search answered by an Ollama chat model.
pub struct OllamaSearchBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    timeout_secs: u64,
}

impl OllamaSearchBackend {
    /// Create a new backend with default settings.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_OLLAMA_URL.to_string(), DEFAULT_GEN_MODEL.to_string())
    }

    /// Create a new backend with custom configuration.
    pub fn with_config(base_url: String, gen_model: String) -> Self {
        let timeout_secs = std::env::var("HOAI_SEARCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SEARCH_TIMEOUT_SECS);
        Self::with_timeout(base_url, gen_model, timeout_secs)
    }

    /// Create a backend with an explicit request timeout.
    pub fn with_timeout(base_url: String, gen_model: String, timeout_secs: u64) -> Self {
        info!(
            subsystem = "inference",
            component = "ollama",
            "Initializing Ollama search backend: url={}, gen={}, timeout={}s",
            base_url,
            gen_model,
            timeout_secs
        );

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            timeout_secs,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        Self::with_config(base_url, gen_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one system + user exchange to `/api/chat` and return the reply text.
    ///
    /// `format: "json"` constrains the model to valid JSON, and thinking is
    /// switched off so reasoning does not leak into the content.
    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            format: Some(serde_json::json!("json")),
            think: Some(false),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }

    /// Check that the Ollama server answers `/api/tags`.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

impl Default for OllamaSearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ollama format enforcement. Set to `"json"` for guaranteed valid JSON output.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl AiSearchBackend for OllamaSearchBackend {
    #[instrument(skip(self, query), fields(subsystem = "inference", component = "ollama", op = "search", model = %self.gen_model, prompt_len = query.len()))]
    async fn search(&self, query: &str) -> Result<AiSearchResult> {
        let raw = self.chat(SYSTEM_PROMPT, query).await?;
        let result = normalize_response(query, &raw);
        debug!(result_count = result.sources.len(), "Search answer normalized");
        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
