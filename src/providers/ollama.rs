use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::providers::llm::{ChatMessage, LLMProvider};

/// Local inference server.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: model.unwrap_or_else(|| "llama3.1".to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Ollama error {}: {}", status, body);
        }

        let body: serde_json::Value = response.json().await?;
        let content = body["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid Ollama response"))?;

        Ok(content.to_string())
    }
}
