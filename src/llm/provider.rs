//! LLM provider abstraction.
//!
//! The generator depends on a hosted model through the
//! [`CompletionProvider`] trait only: given a system and user prompt it
//! returns a structured JSON value or fails. That keeps provider choice
//! out of the pipeline logic and lets tests substitute a deterministic
//! stub.

use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Sampling temperature for SQL generation. Near-deterministic output is
/// worth more than creativity here.
const GENERATION_TEMPERATURE: f64 = 0.1;

/// A hosted model that can answer a prompt with a structured JSON object.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete_structured(&self, system: &str, user: &str) -> AgentResult<JsonValue>;
}

/// Chat-completions client for OpenAI-compatible APIs.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete_structured(&self, system: &str, user: &str) -> AgentResult<JsonValue> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": GENERATION_TEMPERATURE,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::generation(format!("LLM request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::generation(format!("LLM response unreadable: {}", e)))?;

        if !status.is_success() {
            return Err(AgentError::generation(format!(
                "LLM API error ({}): {}",
                status, text
            )));
        }

        let envelope: JsonValue = serde_json::from_str(&text)
            .map_err(|e| AgentError::generation(format!("LLM response is not JSON: {}", e)))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AgentError::generation("LLM response carried no message content")
            })?;

        debug!(model = %self.model, content_len = content.len(), "LLM completion received");

        let stripped = strip_code_fences(content);
        serde_json::from_str(&stripped).map_err(|e| {
            AgentError::generation(format!("LLM content is not a JSON object: {}", e))
        })
    }
}

/// Strip markdown code fences from model output (```json ... ``` or
/// ``` ... ```). Models occasionally fence structured responses even when
/// told not to.
pub fn strip_code_fences(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Skip optional language tag on the first line
        let rest = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        rest.trim().to_string()
    } else {
        trimmed.to_string()
    }
}
