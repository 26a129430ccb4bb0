//! Language-model client abstraction.
//!
//! The pipeline needs exactly one capability: a chat completion that
//! returns best-effort plain text, plus an availability probe. Anything
//! richer (tools, streaming) stays out of the contract so the AI stages
//! degrade cleanly when the backend is a stub.

pub mod json_extract;
pub mod openai;

pub use json_extract::first_json_object;
pub use openai::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Minimal client contract for the language-model service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Request a completion; returns the first choice's message content.
    async fn chat_completion(&self, request: ChatRequest) -> Result<String>;

    /// Cheap probe; when false the AI stages are skipped entirely.
    fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;
}
