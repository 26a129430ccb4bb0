//! Entity extraction: regex rules, LLM enrichment, merge, then
//! parse-and-validate.
//!
//! Values are parsed before reference validation so "Terminal 1" is
//! checked against the registry as the canonical "T1". Parse failures
//! keep the raw text; validation failures drop the value.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, warn};

use airops_reference::{ReferenceError, ReferenceRepository};

use crate::config::NluConfig;
use crate::entities::{
    self, merge_entities, normalise, parse_value, Entities, EntityKind, EntityValue,
};
use crate::errors::NluError;
use crate::llm::{first_json_object, ChatMessage, ChatRequest, LanguageModel};
use crate::parser::Context;
use crate::processor::{Outcome, ProcessorMetrics, StageTimer};

pub const PROCESSOR: &str = "entity-extractor";

const AI_TEMPERATURE: f64 = 0.2;
const AI_MAX_TOKENS: u32 = 150;

/// Hybrid rule + LLM entity extractor.
pub struct EntityExtractor {
    llm: Option<Arc<dyn LanguageModel>>,
    reference: Option<Arc<dyn ReferenceRepository>>,
    config: NluConfig,
    metrics: ProcessorMetrics,
}

impl EntityExtractor {
    pub fn new(
        llm: Option<Arc<dyn LanguageModel>>,
        reference: Option<Arc<dyn ReferenceRepository>>,
        config: NluConfig,
    ) -> Self {
        Self {
            llm,
            reference,
            config,
            metrics: ProcessorMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// Extract, merge and validate the entities of an utterance.
    pub async fn process(&self, text: &str, context: &Context) -> Outcome<Entities> {
        let timer = StageTimer::start(PROCESSOR, &self.metrics, self.config.enable_metrics);
        let today = Local::now().date_naive();
        let result = self.extract(text, context, today).await;
        timer.finish(result.is_ok());
        match result {
            Ok(entities) => {
                let count = entities.len();
                Outcome::ok(PROCESSOR, entities)
                    .with_meta("entityCount", serde_json::json!(count))
            }
            Err(err) => Outcome::err(PROCESSOR, &err),
        }
    }

    async fn extract(
        &self,
        text: &str,
        context: &Context,
        today: NaiveDate,
    ) -> Result<Entities, NluError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NluError::InvalidInput("empty query text".into()));
        }

        let rules = entities::extract_rules(trimmed);

        let ai = match self.llm {
            Some(ref llm) if llm.is_available() => {
                self.ai_stage(llm.as_ref(), trimmed, context, &rules).await
            }
            _ => Entities::new(),
        };

        let merged = merge_entities(rules, ai);
        Ok(self.parse_and_validate(merged, today).await)
    }

    /// LLM stage. Failures are logged and absorbed; the rule result
    /// stands on its own.
    async fn ai_stage(
        &self,
        llm: &dyn LanguageModel,
        text: &str,
        context: &Context,
        rules: &Entities,
    ) -> Entities {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(build_system_prompt(context, rules)),
                ChatMessage::user(text.to_string()),
            ],
            temperature: AI_TEMPERATURE,
            max_tokens: AI_MAX_TOKENS,
        };

        let response = match llm.chat_completion(request).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "entity LLM call failed, keeping rule result");
                return Entities::new();
            }
        };

        let Some(json) = first_json_object(&response) else {
            warn!("entity LLM response contained no JSON object");
            return Entities::new();
        };
        // Accept either a flat object or one wrapped in "entities".
        let object = json
            .get("entities")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or(json);

        let mut out = Entities::new();
        if let Value::Object(map) = object {
            for (key, value) in map {
                let Some(kind) = EntityKind::from_key(&key) else {
                    debug!(key = %key, "LLM returned unknown entity key, discarding");
                    continue;
                };
                if let Some(converted) = convert_json(kind, &value) {
                    out.insert(kind.key().to_string(), converted);
                }
            }
        }
        out
    }

    /// Parse each value to its canonical form, then drop values that
    /// fail reference validation. Single-element lists collapse back to
    /// scalars at the end.
    async fn parse_and_validate(&self, merged: Entities, today: NaiveDate) -> Entities {
        let mut out = Entities::new();
        for (key, value) in merged {
            let Some(kind) = EntityKind::from_key(&key) else {
                continue;
            };

            let parsed = match value {
                EntityValue::List(items) => {
                    let mut kept = Vec::new();
                    for item in items {
                        let item = parse_one(kind, item, today);
                        if self.reference_valid(kind, &item).await {
                            kept.push(item);
                        }
                    }
                    if kept.is_empty() {
                        continue;
                    }
                    EntityValue::List(kept).collapse()
                }
                scalar => {
                    let parsed = parse_one(kind, scalar, today);
                    if !self.reference_valid(kind, &parsed).await {
                        continue;
                    }
                    parsed
                }
            };
            out.insert(key, parsed);
        }
        out
    }

    /// Check a parsed value against the reference registry. Unknown
    /// values are always dropped; an unavailable or failing registry is
    /// tolerated unless `strict_references` is set.
    async fn reference_valid(&self, kind: EntityKind, value: &EntityValue) -> bool {
        let needs_check = matches!(
            kind,
            EntityKind::Stand
                | EntityKind::StandId
                | EntityKind::Airport
                | EntityKind::Airline
                | EntityKind::AircraftType
        );
        if !needs_check {
            return true;
        }
        let Some(ref reference) = self.reference else {
            return !self.config.strict_references;
        };
        let text = value.render();

        let found: Result<bool, ReferenceError> = match kind {
            EntityKind::Stand | EntityKind::StandId => {
                reference.stand_by_name(&text).await.map(|s| s.is_some())
            }
            EntityKind::Airport => reference.airport_by_iata(&text).await.map(|a| a.is_some()),
            EntityKind::Airline => reference.airline_by_iata(&text).await.map(|a| a.is_some()),
            EntityKind::AircraftType => reference
                .aircraft_type_by_iata(&text)
                .await
                .map(|a| a.is_some()),
            _ => Ok(true),
        };

        match found {
            Ok(exists) => {
                if !exists {
                    debug!(kind = kind.key(), value = %text, "unknown reference value dropped");
                }
                exists
            }
            Err(err) => {
                warn!(kind = kind.key(), error = %err, "reference lookup failed");
                !self.config.strict_references
            }
        }
    }
}

fn parse_one(kind: EntityKind, value: EntityValue, today: NaiveDate) -> EntityValue {
    match value {
        EntityValue::Text(raw) => {
            parse_value(kind, &raw, today).unwrap_or(EntityValue::Text(raw))
        }
        other => other,
    }
}

/// Convert an LLM JSON value into an entity value, normalising strings
/// the same way the rule stage does.
fn convert_json(kind: EntityKind, value: &Value) -> Option<EntityValue> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(EntityValue::Text(normalise(kind, trimmed)))
            }
        }
        Value::Bool(b) => Some(EntityValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(EntityValue::Int(i))
            } else {
                n.as_f64().map(EntityValue::Float)
            }
        }
        Value::Array(items) => {
            let mut list = EntityValue::List(Vec::new());
            for item in items {
                if let Some(converted) = convert_json(kind, item) {
                    list = list.push_unique(converted);
                }
            }
            match list {
                EntityValue::List(ref items) if items.is_empty() => None,
                other => Some(other.collapse()),
            }
        }
        _ => None,
    }
}

/// System prompt enumerating the entity vocabulary, with the intent and
/// the rule-stage result as context.
fn build_system_prompt(context: &Context, rules: &Entities) -> String {
    let mut lines = Vec::new();
    lines.push(
        "Extract entities from an airport operations query. Known entity keys:".to_string(),
    );
    for spec in entities::kind_table() {
        lines.push(format!("- {}: {}", spec.kind.key(), spec.description));
    }
    if let Some(ref intent) = context.intent {
        lines.push(format!("The query intent is: {}", intent));
    }
    if !rules.is_empty() {
        if let Ok(found) = serde_json::to_string(rules) {
            lines.push(format!("Already found by pattern rules: {}", found));
        }
    }
    lines.push(
        "Respond with one JSON object mapping entity keys to values. Omit keys that are \
         not present in the query. Use arrays for repeated values."
            .to_string(),
    );
    lines.join("\n")
}
