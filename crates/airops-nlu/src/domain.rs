//! Domain enrichment for read-only queries.
//!
//! Runs after parsing: fills gaps from conversational context, applies
//! the default airport, infers related entities from the reference
//! registry (one hop, never chained), then checks the intent's entity
//! requirements.
//!
//! Every synthesised value is flagged with an underscore-prefixed
//! companion key (`_dateFromContext`, `_terminalInferred`, ...) so a
//! caller can tell stated facts from derived ones.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, warn};

use airops_reference::ReferenceRepository;

use crate::config::NluConfig;
use crate::entities::{Entities, EntityValue};
use crate::errors::NluError;
use crate::intents::{self, Category, TIME_SENSITIVE_INTENTS};
use crate::parser::{Context, ParsedQuery};
use crate::processor::{Outcome, ProcessorMetrics, StageTimer};

pub const PROCESSOR: &str = "domain-processor";

/// Location entity keys eligible for context carry-over.
const LOCATION_KEYS: &[&str] = &["airport", "terminal", "pier", "stand"];

/// An enriched, requirement-checked query ready for execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainQuery {
    pub intent: String,
    pub confidence: f64,
    pub entities: Entities,
    pub category: Option<Category>,
    pub raw_text: String,
}

pub struct DomainProcessor {
    reference: Option<Arc<dyn ReferenceRepository>>,
    config: NluConfig,
    metrics: ProcessorMetrics,
}

impl DomainProcessor {
    pub fn new(reference: Option<Arc<dyn ReferenceRepository>>, config: NluConfig) -> Self {
        Self {
            reference,
            config,
            metrics: ProcessorMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    pub async fn process(&self, parsed: &ParsedQuery, context: &Context) -> Outcome<DomainQuery> {
        let timer = StageTimer::start(PROCESSOR, &self.metrics, self.config.enable_metrics);
        let result = self.enrich(parsed, context).await;
        timer.finish(result.is_ok());
        match result {
            Ok(query) => {
                let location_based = query.category == Some(Category::Asset)
                    || LOCATION_KEYS
                        .iter()
                        .any(|k| query.entities.contains_key(*k));
                // A defaulted date does not make the query time-dependent.
                let stated_date = query.entities.contains_key("date")
                    && !query.entities.contains_key("_dateFromContext");
                let time_dependent = TIME_SENSITIVE_INTENTS.contains(&query.intent.as_str())
                    || stated_date
                    || query.entities.contains_key("time");
                let airport_meta = self.airport_meta(&query.entities).await;
                let category = query.category;
                let mut out = Outcome::ok(PROCESSOR, query)
                    .with_meta("locationBased", serde_json::json!(location_based))
                    .with_meta("timeDependent", serde_json::json!(time_dependent));
                if let Some(category) = category {
                    out = out.with_meta("category", serde_json::json!(category));
                }
                if let Some(airport) = airport_meta {
                    out = out.with_meta("airport", airport);
                }
                out
            }
            Err(err) => Outcome::err(PROCESSOR, &err),
        }
    }

    async fn enrich(
        &self,
        parsed: &ParsedQuery,
        context: &Context,
    ) -> Result<DomainQuery, NluError> {
        let mut entities = parsed.entities.clone();

        if self.config.context_enabled {
            merge_from_context(&mut entities, context);
        }

        // Queries without a stated date are answered about today.
        if !entities.contains_key("date") {
            let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
            entities.insert("date".into(), EntityValue::Text(today));
            entities.insert("_dateFromContext".into(), EntityValue::Bool(true));
        }

        if !entities.contains_key("airport") {
            entities.insert(
                "airport".into(),
                EntityValue::Text(self.config.default_airport.clone()),
            );
            entities.insert("_airportFromDefault".into(), EntityValue::Bool(true));
        }

        self.infer_related(&mut entities).await;

        check_requirements(&parsed.intent, &entities)?;

        Ok(DomainQuery {
            intent: parsed.intent.clone(),
            confidence: parsed.confidence,
            entities,
            category: intents::category_of(&parsed.intent),
            raw_text: parsed.raw_text.clone(),
        })
    }

    /// One-hop relational inference. Sources are the stated entities
    /// only; values inferred here never seed further inference.
    async fn infer_related(&self, entities: &mut Entities) {
        let Some(ref reference) = self.reference else {
            return;
        };

        let stand = entities
            .get("stand")
            .filter(|v| !v.is_list())
            .map(|v| v.render());
        if let Some(stand_name) = stand {
            let needs_terminal = !entities.contains_key("terminal");
            let needs_pier = !entities.contains_key("pier");
            let needs_max_size = !entities.contains_key("standMaxSize");
            if needs_terminal || needs_pier || needs_max_size {
                match reference.stand_by_name(&stand_name).await {
                    Ok(Some(record)) => {
                        if needs_terminal {
                            if let Some(terminal) = record.terminal {
                                debug!(stand = %stand_name, terminal = %terminal, "terminal inferred from stand");
                                entities
                                    .insert("terminal".into(), EntityValue::Text(terminal));
                                entities
                                    .insert("_terminalInferred".into(), EntityValue::Bool(true));
                            }
                        }
                        if needs_pier {
                            if let Some(pier) = record.pier {
                                entities.insert("pier".into(), EntityValue::Text(pier));
                                entities.insert("_pierInferred".into(), EntityValue::Bool(true));
                            }
                        }
                        // Lets fit questions compare against aircraftSize.
                        if needs_max_size {
                            if let Some(max_size) = record.max_size {
                                entities.insert(
                                    "standMaxSize".into(),
                                    EntityValue::Text(max_size.to_string()),
                                );
                                entities.insert(
                                    "_standMaxSizeInferred".into(),
                                    EntityValue::Bool(true),
                                );
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "stand lookup failed during inference"),
                }
            }
        }

        let aircraft = entities
            .get("aircraftType")
            .filter(|v| !v.is_list())
            .map(|v| v.render());
        if let Some(code) = aircraft {
            if !entities.contains_key("aircraftSize") {
                match reference.aircraft_type_by_iata(&code).await {
                    Ok(Some(record)) => {
                        entities.insert(
                            "aircraftSize".into(),
                            EntityValue::Text(record.size.to_string()),
                        );
                        entities.insert("_aircraftSizeInferred".into(), EntityValue::Bool(true));
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "aircraft lookup failed during inference"),
                }
            }
        }
    }

    async fn airport_meta(&self, entities: &Entities) -> Option<serde_json::Value> {
        let iata = entities.get("airport")?.render();
        if let Some(ref reference) = self.reference {
            if let Ok(Some(airport)) = reference.airport_by_iata(&iata).await {
                return Some(serde_json::json!({
                    "iata": airport.iata,
                    "name": airport.name,
                }));
            }
        }
        Some(serde_json::json!({ "iata": iata }))
    }
}

/// Pull missing location entities from the context bag, then from the
/// most recent query that mentioned them.
fn merge_from_context(entities: &mut Entities, context: &Context) {
    for key in LOCATION_KEYS {
        if entities.contains_key(*key) {
            continue;
        }
        let carried = context.entities.get(*key).cloned().or_else(|| {
            context
                .recent_queries
                .iter()
                .rev()
                .find_map(|q| q.entities.get(*key).cloned())
        });
        if let Some(value) = carried {
            entities.insert((*key).to_string(), value);
            entities.insert(format!("_{}FromContext", key), EntityValue::Bool(true));
        }
    }
}

/// Check the intent's entity requirements; collects every gap before
/// failing so the caller sees the full list.
fn check_requirements(intent: &str, entities: &Entities) -> Result<(), NluError> {
    let Some(req) = intents::requirements(intent) else {
        return Ok(());
    };

    let mut missing: Vec<String> = req
        .required
        .iter()
        .filter(|k| !entities.contains_key(**k))
        .map(|k| k.to_string())
        .collect();

    if !req.any_of.is_empty() {
        let satisfied = req
            .any_of
            .iter()
            .any(|group| group.iter().all(|k| entities.contains_key(*k)));
        if !satisfied {
            let groups: Vec<String> = req
                .any_of
                .iter()
                .map(|group| group.join("+"))
                .collect();
            missing.push(format!("one of: {}", groups.join(" | ")));
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(NluError::missing_required(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::heathrow_fixture;
    use chrono::Utc;

    fn repo() -> Arc<dyn ReferenceRepository> {
        Arc::new(heathrow_fixture())
    }

    fn processor() -> DomainProcessor {
        DomainProcessor::new(Some(repo()), NluConfig::default())
    }

    fn parsed(intent: &str, entities: Entities) -> ParsedQuery {
        ParsedQuery {
            intent: intent.to_string(),
            confidence: 0.85,
            entities,
            raw_text: String::new(),
            timestamp: Utc::now(),
            conversation_id: None,
            alternative_intent: None,
            alternative_confidence: None,
        }
    }

    fn text(v: &str) -> EntityValue {
        EntityValue::Text(v.to_string())
    }

    #[tokio::test]
    async fn terminal_and_pier_inferred_from_stand() {
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        let out = processor()
            .process(&parsed("stand.details", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["terminal"], text("T1"));
        assert_eq!(query.entities["_terminalInferred"], EntityValue::Bool(true));
        assert_eq!(query.entities["pier"], text("A"));
    }

    #[tokio::test]
    async fn stand_max_size_supports_fit_questions() {
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        entities.insert("aircraftType".into(), text("777"));
        let out = processor()
            .process(&parsed("aircraft.stands", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["standMaxSize"], text("E"));
        assert_eq!(
            query.entities["_standMaxSizeInferred"],
            EntityValue::Bool(true)
        );
        assert_eq!(query.entities["aircraftSize"], text("E"));
    }

    #[tokio::test]
    async fn aircraft_size_inferred_from_type() {
        let mut entities = Entities::new();
        entities.insert("aircraftType".into(), text("777"));
        let out = processor()
            .process(&parsed("aircraft.stands", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["aircraftSize"], text("E"));
        assert_eq!(
            query.entities["_aircraftSizeInferred"],
            EntityValue::Bool(true)
        );
    }

    #[tokio::test]
    async fn default_airport_is_applied_and_flagged() {
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        let out = processor()
            .process(&parsed("stand.details", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["airport"], text("LHR"));
        assert_eq!(
            query.entities["_airportFromDefault"],
            EntityValue::Bool(true)
        );
        assert_eq!(
            out.metadata.extra["airport"]["name"],
            serde_json::json!("Heathrow")
        );
    }

    #[tokio::test]
    async fn time_sensitive_intent_defaults_date_to_today() {
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        let out = processor()
            .process(&parsed("stand.availability", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(query.entities["date"], text(&today));
        assert_eq!(query.entities["_dateFromContext"], EntityValue::Bool(true));
        assert_eq!(
            out.metadata.extra["timeDependent"],
            serde_json::json!(true)
        );
    }

    #[tokio::test]
    async fn stated_date_is_not_overridden() {
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        entities.insert("date".into(), text("2025-12-01"));
        let out = processor()
            .process(&parsed("stand.availability", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["date"], text("2025-12-01"));
        assert!(!query.entities.contains_key("_dateFromContext"));
    }

    #[tokio::test]
    async fn location_carries_over_from_recent_query() {
        let mut prior = Entities::new();
        prior.insert("stand".into(), text("A1"));
        let context = Context {
            recent_queries: vec![parsed("stand.details", prior)],
            ..Context::default()
        };
        let out = processor()
            .process(&parsed("stand.status", Entities::new()), &context)
            .await;
        let query = out.data.unwrap();
        assert_eq!(query.entities["stand"], text("A1"));
        assert_eq!(query.entities["_standFromContext"], EntityValue::Bool(true));
    }

    #[tokio::test]
    async fn context_merge_can_be_disabled() {
        let mut prior = Entities::new();
        prior.insert("stand".into(), text("A1"));
        let context = Context {
            recent_queries: vec![parsed("stand.details", prior)],
            ..Context::default()
        };
        let config = NluConfig {
            context_enabled: false,
            ..NluConfig::default()
        };
        let out = DomainProcessor::new(Some(repo()), config)
            .process(&parsed("stand.status", Entities::new()), &context)
            .await;
        assert_eq!(out.error_code(), Some("VALIDATION_FAILED"));
    }

    #[tokio::test]
    async fn missing_required_entity_fails_validation() {
        let out = processor()
            .process(&parsed("stand.details", Entities::new()), &Context::default())
            .await;
        assert_eq!(out.error_code(), Some("VALIDATION_FAILED"));
        let details = out.metadata.error.unwrap().details.unwrap();
        assert_eq!(details["missingRequired"][0], "stand");
    }

    #[tokio::test]
    async fn any_of_groups_must_satisfy_together() {
        // Latitude alone does not satisfy the latitude+longitude group.
        let mut entities = Entities::new();
        entities.insert("latitude".into(), EntityValue::Float(51.47));
        let out = processor()
            .process(&parsed("stand.nearest", entities.clone()), &Context::default())
            .await;
        assert_eq!(out.error_code(), Some("VALIDATION_FAILED"));

        entities.insert("longitude".into(), EntityValue::Float(-0.45));
        let out = processor()
            .process(&parsed("stand.nearest", entities), &Context::default())
            .await;
        assert!(out.success);
    }

    #[tokio::test]
    async fn inference_is_single_hop() {
        // Terminal arrives via stand inference; nothing else may chain
        // off that inferred terminal.
        let mut entities = Entities::new();
        entities.insert("stand".into(), text("A1"));
        let out = processor()
            .process(&parsed("stand.details", entities), &Context::default())
            .await;
        let query = out.data.unwrap();
        let inferred: Vec<&String> = query
            .entities
            .keys()
            .filter(|k| k.starts_with('_') && k.ends_with("Inferred"))
            .collect();
        assert_eq!(inferred.len(), 3); // terminal, pier and stand max size only
    }
}
