//! OpenAI-compatible chat-completion client.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::LlmConfig;

use super::{ChatRequest, LanguageModel};

/// Client for any OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: Option<String>,
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiClient {
    /// Create a client; requests time out at `config.timeout`.
    pub fn new(api_key: Option<String>, config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            client,
            config,
        }
    }

    /// Create from `OPENAI_API_KEY` / `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(Some(api_key), LlmConfig::default()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut http = self.client.post(&self.config.base_url).json(&body);
        if let Some(ref key) = self.api_key {
            http = http.header("Authorization", format!("Bearer {}", key));
        }

        let response = http.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion error {}: {}", status, body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
