use crate::config::AppConfig;
use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Chat-completions client for an Azure-style model deployment.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    api_version: String,
    deployment: String,
}

impl LlmClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            endpoint: config.openai_endpoint.trim_end_matches('/').to_string(),
            api_version: config.openai_api_version.clone(),
            deployment: config.deployment.clone(),
        }
    }

    /// Send one chat turn and return the model's text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        // Offline path for tests: a dummy key short-circuits the transport.
        if self.api_key == "dummy-api-key" {
            return Ok("Final Answer: information not found".to_string());
        }

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );

        let body = serde_json::json!({
            "messages": messages,
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(InsightError::Llm(format!(
                "LLM API returned {}: {}",
                status, detail
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InsightError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InsightError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_client() -> LlmClient {
        LlmClient {
            client: reqwest::Client::new(),
            api_key: "dummy-api-key".to_string(),
            endpoint: "http://localhost".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: "gpt-4".to_string(),
        }
    }

    #[tokio::test]
    async fn dummy_key_short_circuits() {
        let client = dummy_client();
        let reply = client.chat(&[ChatMessage::user("hello")]).await.unwrap();
        assert!(reply.starts_with("Final Answer:"));
    }
}
