use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::LlmError;

/// The LLM provider contract named in spec.md §6: `generate(prompt,
/// user_id, deadline) -> text | error`. The concrete provider (Ollama,
/// OpenRouter, or anything OpenAI-compatible) is an out-of-scope
/// collaborator; this trait is the seam the orchestrator programs against.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, user_id: &str, deadline: Duration) -> Result<String, LlmError>;
}

/// Reference provider against an OpenAI-compatible `/chat/completions`
/// endpoint, kept as the one concrete implementation for integration
/// tests and local exercising — trimmed from the teacher's
/// `OpenRouterClient` (dropped: tool calls, SSE streaming, the
/// Ollama-specific sibling client, since the orchestrator only ever
/// needs single-shot text generation).
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn generate(&self, prompt: &str, _user_id: &str, deadline: Duration) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = tokio::time::timeout(deadline, request.send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Provider(format!("provider returned {status}: {body}")));
        }

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Provider("response had no message content".to_string()))
    }
}
