use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{LlmProvider, Message};

/// Upper bound for one extraction call; past it the step fails.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client,
        }
    }

    /// Non-streaming JSON-mode chat at temperature 0, so the same description
    /// yields the same entities.
    fn request_body(&self, system_prompt: &str, messages: &[Message]) -> Value {
        let chat: Vec<Value> = std::iter::once(json!({ "role": "system", "content": system_prompt }))
            .chain(
                messages
                    .iter()
                    .map(|m| json!({ "role": m.role, "content": m.content })),
            )
            .collect();

        json!({
            "model": self.model,
            "messages": chat,
            "stream": false,
            "format": "json",
            "options": { "temperature": 0 },
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let endpoint = format!("{}/api/chat", self.url);
        tracing::debug!(%endpoint, model = %self.model, "requesting symptom extraction");

        let data: Value = self
            .client
            .post(&endpoint)
            .json(&self.request_body(system_prompt, messages))
            .send()
            .await
            .context("failed to reach Ollama")?
            .error_for_status()
            .context("Ollama returned an error status")?
            .json()
            .await
            .context("failed to decode Ollama response")?;

        data["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Ollama response has no message content"))
    }
}
