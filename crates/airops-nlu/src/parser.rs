//! Query parsing: classification and extraction behind one call, with a
//! confidence gate and a bounded result cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use airops_reference::ReferenceRepository;

use crate::cache::QueryCache;
use crate::classifier::IntentClassifier;
use crate::config::NluConfig;
use crate::entities::Entities;
use crate::errors::NluError;
use crate::extractor::EntityExtractor;
use crate::llm::LanguageModel;
use crate::processor::{ConfidenceBand, Outcome, ProcessorMetrics, StageTimer};

pub const PROCESSOR: &str = "query-parser";

/// A fully parsed query: intent plus validated entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub intent: String,
    pub confidence: f64,
    pub entities: Entities,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_confidence: Option<f64>,
}

/// Conversational context carried between queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub recent_queries: Vec<ParsedQuery>,
    #[serde(default)]
    pub entities: Entities,
    /// Intent hint for the extractor, set by the parser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl Context {
    pub fn for_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::default()
        }
    }
}

/// Orchestrates the classifier and extractor with caching.
pub struct QueryParser {
    classifier: IntentClassifier,
    extractor: EntityExtractor,
    cache: QueryCache,
    config: NluConfig,
    metrics: ProcessorMetrics,
}

impl QueryParser {
    pub fn new(
        llm: Option<Arc<dyn LanguageModel>>,
        reference: Option<Arc<dyn ReferenceRepository>>,
        config: NluConfig,
    ) -> Self {
        let cache_capacity = if config.cache_enabled {
            config.cache_size
        } else {
            0
        };
        Self {
            classifier: IntentClassifier::new(llm.clone(), config.clone()),
            extractor: EntityExtractor::new(llm, reference, config.clone()),
            cache: QueryCache::new(cache_capacity),
            config,
            metrics: ProcessorMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Parse one utterance into an intent and entity set.
    pub async fn process(&self, text: &str, context: &Context) -> Outcome<ParsedQuery> {
        let timer = StageTimer::start(PROCESSOR, &self.metrics, self.config.enable_metrics);
        let result = self.parse(text, context).await;
        timer.finish(result.is_ok());
        match result {
            Ok((parsed, source)) => {
                let band = ConfidenceBand::of(parsed.confidence, &self.config);
                let count = parsed.entities.len();
                let mut out = Outcome::ok(PROCESSOR, parsed)
                    .with_meta("cached", serde_json::json!(source.is_none()))
                    .with_meta("confidenceBand", serde_json::json!(band.as_str()))
                    .with_meta("entityCount", serde_json::json!(count));
                // Cache hits have no classification stage to report.
                if let Some(source) = source {
                    out = out.with_meta("intentSource", serde_json::json!(source));
                }
                out
            }
            Err(err) => Outcome::err(PROCESSOR, &err),
        }
    }

    /// On success returns the parsed query and the classification method
    /// (`"rules"` or `"ai"`); `None` means the result came from the cache.
    async fn parse(
        &self,
        text: &str,
        context: &Context,
    ) -> Result<(ParsedQuery, Option<&'static str>), NluError> {
        let normalised = normalise_text(text);
        if normalised.is_empty() {
            return Err(NluError::InvalidInput("empty query text".into()));
        }

        let conversation = context.conversation_id.as_deref();
        if let Some(hit) = self.cache.get(&normalised, conversation) {
            return Ok((hit, None));
        }

        let classified = self.classifier.process(&normalised, context).await;
        let Some(intent) = classified.data else {
            let reason = classified
                .metadata
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "classifier returned no result".to_string());
            return Err(NluError::IntentClassificationFailed(reason));
        };

        if intent.confidence < self.config.min_confidence_threshold {
            return Err(NluError::LowConfidence {
                intent: intent.intent,
                confidence: intent.confidence,
                minimum: self.config.min_confidence_threshold,
            });
        }
        // Catalogue membership is a hard invariant of every ParsedQuery.
        if crate::intents::lookup(&intent.intent).is_none() {
            return Err(NluError::IntentClassificationFailed(format!(
                "intent {} is not in the catalogue",
                intent.intent
            )));
        }

        // The extractor sees the classified intent as a hint.
        let mut extraction_context = context.clone();
        extraction_context.intent = Some(intent.intent.clone());
        let extracted = self.extractor.process(&normalised, &extraction_context).await;
        let Some(entities) = extracted.data else {
            let reason = extracted
                .metadata
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "extractor returned no result".to_string());
            return Err(NluError::EntityExtractionFailed(reason));
        };

        debug!(
            intent = %intent.intent,
            confidence = intent.confidence,
            entities = entities.len(),
            "query parsed"
        );

        let method = intent.method;
        let parsed = ParsedQuery {
            intent: intent.intent,
            confidence: intent.confidence,
            entities,
            raw_text: normalised.clone(),
            timestamp: Utc::now(),
            conversation_id: context.conversation_id.clone(),
            alternative_intent: intent.alternative_intent,
            alternative_confidence: intent.alternative_confidence,
        };

        self.cache.put(&normalised, conversation, parsed.clone());
        Ok((parsed, Some(method)))
    }
}

/// Trim and collapse internal whitespace runs to single spaces.
fn normalise_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{heathrow_fixture, ScriptedLlm};

    fn repo() -> Arc<dyn ReferenceRepository> {
        Arc::new(heathrow_fixture())
    }

    #[test]
    fn whitespace_normalisation() {
        assert_eq!(normalise_text("  show   stand\tA1 "), "show stand A1");
        assert_eq!(normalise_text("   "), "");
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let parser = QueryParser::new(None, Some(repo()), NluConfig::default());
        let out = parser.process("   ", &Context::default()).await;
        assert_eq!(out.error_code(), Some("INVALID_INPUT"));
    }

    #[tokio::test]
    async fn rules_only_parse() {
        let parser = QueryParser::new(None, Some(repo()), NluConfig::default());
        let out = parser
            .process("Tell me about stand A1", &Context::default())
            .await;
        assert!(out.success);
        let parsed = out.data.unwrap();
        assert_eq!(parsed.intent, "stand.details");
        assert_eq!(parsed.entities["stand"].render(), "A1");
        assert_eq!(
            out.metadata.extra.get("cached"),
            Some(&serde_json::json!(false))
        );
        assert_eq!(
            out.metadata.extra.get("intentSource"),
            Some(&serde_json::json!("rules"))
        );
        assert_eq!(
            out.metadata.extra.get("entityCount"),
            Some(&serde_json::json!(1))
        );
    }

    #[tokio::test]
    async fn intent_source_reports_ai_classification() {
        let llm: Arc<dyn LanguageModel> = Arc::new(ScriptedLlm::matching(&[
            ("classify", r#"{"intent": "stand.availability", "confidence": 0.8}"#),
            ("Extract entities", r#"{"stand": "A1"}"#),
        ]));
        let parser = QueryParser::new(Some(llm), Some(repo()), NluConfig::default());
        let out = parser
            .process("will stand A1 be free soon", &Context::default())
            .await;
        assert!(out.success);
        assert_eq!(
            out.metadata.extra.get("intentSource"),
            Some(&serde_json::json!("ai"))
        );
    }

    #[tokio::test]
    async fn unclassifiable_input_fails() {
        let parser = QueryParser::new(None, Some(repo()), NluConfig::default());
        let out = parser
            .process("something very unclear", &Context::default())
            .await;
        assert_eq!(out.error_code(), Some("INTENT_CLASSIFICATION_FAILED"));
    }

    #[tokio::test]
    async fn low_confidence_is_gated() {
        let llm: Arc<dyn LanguageModel> = Arc::new(ScriptedLlm::always(
            r#"{"intent": "stand.details", "confidence": 0.4}"#,
        ));
        let parser = QueryParser::new(Some(llm), Some(repo()), NluConfig::default());
        let out = parser
            .process("hmm that one maybe", &Context::default())
            .await;
        assert_eq!(out.error_code(), Some("LOW_CONFIDENCE"));
        let details = out.metadata.error.unwrap().details.unwrap();
        assert_eq!(details["intent"], "stand.details");
    }

    #[tokio::test]
    async fn repeat_query_is_served_from_cache() {
        let parser = QueryParser::new(None, Some(repo()), NluConfig::default());
        let context = Context::for_conversation("conv-1");
        let first = parser.process("Tell me about stand A1", &context).await;
        assert_eq!(
            first.metadata.extra.get("cached"),
            Some(&serde_json::json!(false))
        );
        // Same text up to case and spacing.
        let second = parser.process("tell me about stand  a1", &context).await;
        assert_eq!(
            second.metadata.extra.get("cached"),
            Some(&serde_json::json!(true))
        );
        // A cache hit reports no classification source.
        assert!(!second.metadata.extra.contains_key("intentSource"));
        assert_eq!(second.data.unwrap().intent, "stand.details");
    }

    #[tokio::test]
    async fn cache_can_be_disabled() {
        let config = NluConfig {
            cache_enabled: false,
            ..NluConfig::default()
        };
        let parser = QueryParser::new(None, Some(repo()), config);
        let context = Context::default();
        parser.process("Tell me about stand A1", &context).await;
        let second = parser.process("Tell me about stand A1", &context).await;
        assert_eq!(
            second.metadata.extra.get("cached"),
            Some(&serde_json::json!(false))
        );
    }
}
