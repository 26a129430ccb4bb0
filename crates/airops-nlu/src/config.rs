//! Pipeline configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration shared by every pipeline component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NluConfig {
    /// Band boundary: results at or above this are "medium".
    pub confidence_threshold: f64,
    /// Band boundary: results at or above this are "high"; a rule hit at
    /// or above this skips the AI stage entirely.
    pub high_confidence_threshold: f64,
    /// Band boundary: results at or above this are "low", below it
    /// "insufficient".
    pub low_confidence_threshold: f64,
    /// Hard gate applied by the query parser; classifications below this
    /// are rejected with LOW_CONFIDENCE.
    pub min_confidence_threshold: f64,
    /// Query cache capacity; oldest-inserted entry is evicted on overflow.
    pub cache_size: usize,
    pub cache_enabled: bool,
    /// IATA code applied when no airport is present anywhere in the
    /// query or its context.
    pub default_airport: String,
    /// When false, conversation context is ignored during domain
    /// processing.
    pub context_enabled: bool,
    pub enable_metrics: bool,
    /// When true, a reference-service error (or unavailable service) is a
    /// validation failure. When false, the lookup is treated as
    /// permissively valid and only a genuine "record not found" fails.
    pub strict_references: bool,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            high_confidence_threshold: 0.9,
            low_confidence_threshold: 0.5,
            min_confidence_threshold: 0.55,
            cache_size: 100,
            cache_enabled: true,
            default_airport: "LHR".to_string(),
            context_enabled: true,
            enable_metrics: true,
            strict_references: false,
        }
    }
}

/// Language-model client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    /// Chat-completions endpoint, OpenAI-compatible.
    pub base_url: String,
    pub model: String,
    /// Hard deadline per request.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Token cap for classification/extraction responses; the expected
    /// payload is one small JSON object.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self {
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model,
            timeout: Duration::from_secs(10),
            max_tokens: 150,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
