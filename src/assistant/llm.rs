use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::OpenAiConfig;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Model request failed: {0}")]
    Network(String),
    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected model response: {0}")]
    Parse(String),
    #[error("Assistant is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError>;
}

/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self::new(config.api_key.clone(), &config.base_url, &config.model)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let api_key = self.api_key.as_deref().ok_or(AssistantError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": 800,
                "temperature": 0.3
            }))
            .send()
            .await
            .map_err(|e| AssistantError::Network(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(usage) = body.get("usage") {
            debug!("Chat completion usage: {usage}");
        }
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AssistantError::Parse("missing choices[0].message.content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_reads_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":" Hello! "}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(Some("sk-test".into()), &server.url(), "gpt-test");
        let reply = client.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(reply, "Hello!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(Some("sk".into()), &server.url(), "m");
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AssistantError::Api { status: 429, ref message } if message == "Rate limit reached"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = OpenAiClient::new(None, "http://localhost", "m");
        assert!(matches!(
            client.complete(&[]).await,
            Err(AssistantError::NotConfigured)
        ));
    }
}
