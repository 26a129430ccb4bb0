//! CRUD operation specialisation.
//!
//! Takes over from the domain processor when the intent is a
//! `<verb>.<entity>` pair: infers the operation kind, projects the
//! entity bag into a clean parameter record, checks completeness against
//! the per-operation schema, validates and normalises the parameters,
//! and synthesises a confirmation prompt for mutating operations.

pub mod confirmation;
pub mod schema;
pub mod validation;

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use airops_reference::ReferenceRepository;

use crate::config::NluConfig;
use crate::entities::{Entities, EntityValue};
use crate::errors::NluError;
use crate::intents;
use crate::llm::first_json_object;
use crate::parser::ParsedQuery;
use crate::processor::{Outcome, ProcessorMetrics, StageTimer};

pub const PROCESSOR: &str = "operation-processor";

/// CRUD operation kind, inferred from the intent's verb prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
}

impl OperationKind {
    pub fn from_verb(verb: &str) -> Option<Self> {
        if intents::CREATE_VERBS.contains(&verb) {
            Some(Self::Create)
        } else if intents::READ_VERBS.contains(&verb) {
            Some(Self::Read)
        } else if intents::UPDATE_VERBS.contains(&verb) {
            Some(Self::Update)
        } else if intents::DELETE_VERBS.contains(&verb) {
            Some(Self::Delete)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Completeness report against the operation's required parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterStatus {
    pub is_complete: bool,
    pub missing_params: Vec<String>,
    pub required_params: Vec<String>,
}

/// A fully specialised CRUD operation, ready for dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrudOperation {
    pub operation_type: OperationKind,
    pub entity_type: String,
    pub parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_to_update: Option<Map<String, Value>>,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    pub parameter_status: ParameterStatus,
}

pub struct OperationProcessor {
    reference: Option<Arc<dyn ReferenceRepository>>,
    config: NluConfig,
    metrics: ProcessorMetrics,
}

impl OperationProcessor {
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

    pub async fn process(&self, parsed: &ParsedQuery) -> Outcome<CrudOperation> {
        let timer = StageTimer::start(PROCESSOR, &self.metrics, self.config.enable_metrics);
        let today = Local::now().date_naive();
        let result = self.specialise(parsed, today).await;
        timer.finish(result.is_ok());
        match result {
            Ok(operation) => {
                let kind = operation.operation_type;
                let entity = operation.entity_type.clone();
                Outcome::ok(PROCESSOR, operation)
                    .with_meta("operationType", serde_json::json!(kind))
                    .with_meta("entityType", serde_json::json!(entity))
            }
            Err(err) => Outcome::err(PROCESSOR, &err),
        }
    }

    async fn specialise(
        &self,
        parsed: &ParsedQuery,
        today: NaiveDate,
    ) -> Result<CrudOperation, NluError> {
        let (verb, entity_plural) = intents::split_crud(&parsed.intent).ok_or_else(|| {
            NluError::Processing(format!("not a CRUD intent: {}", parsed.intent))
        })?;
        let kind = OperationKind::from_verb(verb).ok_or_else(|| {
            NluError::Processing(format!("unknown operation verb: {}", verb))
        })?;
        let entity = entity_plural.trim_end_matches('s').to_string();

        let Some(op_schema) = schema::schema_for(kind, &entity) else {
            return Err(NluError::ValidationFailed {
                problems: vec![format!(
                    "No validation schema found for operation type: {}_{}",
                    kind.as_str(),
                    entity
                )],
                missing_required: Vec::new(),
            });
        };

        let (params, fields_to_update) =
            select_parameters(kind, &entity, &parsed.entities, &parsed.raw_text);

        let required_params: Vec<String> =
            op_schema.required.iter().map(|r| r.to_string()).collect();
        let mut missing_params: Vec<String> = op_schema
            .required
            .iter()
            .filter(|r| !params.contains_key(**r))
            .map(|r| r.to_string())
            .collect();
        if kind == OperationKind::Update
            && fields_to_update.as_ref().map(Map::is_empty).unwrap_or(true)
        {
            missing_params.push("fieldsToUpdate".to_string());
        }
        let is_complete = missing_params.is_empty();

        let (normalised, mut problems) = validation::coerce_and_check(op_schema, &params, today);
        let normalised_fields = fields_to_update.map(|fields| {
            let (fields, field_problems) = validation::coerce_and_check(op_schema, &fields, today);
            problems.extend(field_problems);
            fields
        });

        problems.extend(
            validation::check_references(
                op_schema,
                &normalised,
                self.reference.as_deref(),
                self.config.strict_references,
            )
            .await,
        );

        if !problems.is_empty() {
            return Err(NluError::ValidationFailed {
                problems,
                missing_required: missing_params,
            });
        }

        let requires_confirmation = kind != OperationKind::Read;
        let confirmation_message = (requires_confirmation && is_complete).then(|| {
            confirmation::message(kind, &entity, &normalised, normalised_fields.as_ref())
        });

        Ok(CrudOperation {
            operation_type: kind,
            entity_type: entity,
            parameters: normalised,
            fields_to_update: normalised_fields,
            requires_confirmation,
            confirmation_message,
            parameter_status: ParameterStatus {
                is_complete,
                missing_params,
                required_params,
            },
        })
    }
}

// ── Parameter selection ──────────────────────────────────────────────

/// Project the entity bag into the parameter record for one operation,
/// plus the `fieldsToUpdate` sub-record for updates.
fn select_parameters(
    kind: OperationKind,
    entity: &str,
    entities: &Entities,
    raw_text: &str,
) -> (Map<String, Value>, Option<Map<String, Value>>) {
    let mut params = Map::new();

    match kind {
        OperationKind::Create => {
            let keys: &[&str] = match entity {
                "stand" => &[
                    "name", "terminal", "pier", "type", "capacity", "status", "features",
                    "location", "description", "code",
                ],
                "maintenance" => &[
                    "standId", "startDate", "endDate", "reason", "priority", "description",
                ],
                "terminal" => &["name", "code", "capacity", "description"],
                _ => &[],
            };
            copy_keys(entities, keys, &mut params);
            apply_create_fallbacks(entity, entities, &mut params);
            (params, None)
        }
        OperationKind::Read => {
            if let Some(id) = identifier(entity, entities) {
                params.insert("id".to_string(), id);
            }
            copy_keys(
                entities,
                &[
                    "terminal", "pier", "status", "limit", "sortBy", "orderDirection",
                    "filterBy", "format",
                ],
                &mut params,
            );
            (params, None)
        }
        OperationKind::Update => {
            if let Some(id) = identifier(entity, entities) {
                params.insert("id".to_string(), id);
            }
            let mutable: &[&str] = match entity {
                "stand" => &[
                    "name", "terminal", "pier", "type", "capacity", "status", "features",
                    "location", "description",
                ],
                "maintenance" => &[
                    "startDate", "endDate", "reason", "priority", "status", "description",
                ],
                "terminal" => &["name", "code", "capacity", "status", "description"],
                _ => &[],
            };
            let mut fields = Map::new();
            copy_keys(entities, mutable, &mut fields);
            for (key, value) in mine_inline_pairs(raw_text) {
                fields.entry(key).or_insert(value);
            }
            if let Some(Value::Object(embedded)) = first_json_object(raw_text) {
                for (key, value) in embedded {
                    if key != "id" {
                        fields.insert(key, value);
                    }
                }
            }
            (params, Some(fields))
        }
        OperationKind::Delete => {
            if let Some(id) = identifier(entity, entities) {
                params.insert("id".to_string(), id);
            }
            let lower = raw_text.to_lowercase();
            if ["soft delete", "mark as deleted", "archive"]
                .iter()
                .any(|phrase| lower.contains(phrase))
            {
                params.insert("softDelete".to_string(), Value::Bool(true));
            }
            if ["cascade", "with related", "and all associated"]
                .iter()
                .any(|phrase| lower.contains(phrase))
            {
                params.insert("cascade".to_string(), Value::Bool(true));
            }
            (params, None)
        }
    }
}

/// Identifier entity for an operation target, most specific key first.
fn identifier(entity: &str, entities: &Entities) -> Option<Value> {
    let candidates: &[&str] = match entity {
        "stand" => &["id", "standId", "stand", "name"],
        "terminal" => &["id", "terminal", "name"],
        "maintenance" => &["id", "code"],
        _ => &["id", "name"],
    };
    candidates
        .iter()
        .find_map(|key| entity_json(entities, key))
}

fn apply_create_fallbacks(entity: &str, entities: &Entities, params: &mut Map<String, Value>) {
    match entity {
        // A bare stand code doubles as the new stand's name.
        "stand" => {
            if !params.contains_key("name") {
                if let Some(stand) = entity_json(entities, "stand") {
                    params.insert("name".to_string(), stand);
                }
            }
        }
        "terminal" => {
            if !params.contains_key("name") {
                if let Some(terminal) = entity_json(entities, "terminal") {
                    params.insert("name".to_string(), terminal);
                }
            }
        }
        "maintenance" => {
            if !params.contains_key("standId") {
                if let Some(stand) = entity_json(entities, "stand") {
                    params.insert("standId".to_string(), stand);
                }
            }
            // A two-date sequence maps onto the start/end pair.
            if let Some(EntityValue::List(dates)) = entities.get("date") {
                if !params.contains_key("startDate") {
                    if let Some(first) = dates.first() {
                        params.insert(
                            "startDate".to_string(),
                            Value::String(first.render()),
                        );
                    }
                }
                if !params.contains_key("endDate") {
                    if let Some(second) = dates.get(1) {
                        params.insert("endDate".to_string(), Value::String(second.render()));
                    }
                }
            } else if let Some(date) = entity_json(entities, "date") {
                if !params.contains_key("startDate") {
                    params.insert("startDate".to_string(), date);
                }
            }
        }
        _ => {}
    }
}

fn copy_keys(entities: &Entities, keys: &[&str], out: &mut Map<String, Value>) {
    for key in keys {
        if let Some(value) = entity_json(entities, key) {
            out.insert((*key).to_string(), value);
        }
    }
}

fn entity_json(entities: &Entities, key: &str) -> Option<Value> {
    entities
        .get(key)
        .and_then(|v| serde_json::to_value(v).ok())
}

// ── Inline field mining ──────────────────────────────────────────────

static QUOTED_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z][A-Za-z0-9_]*)\s*(?:=|:)\s*"([^"]*)""#).expect("invalid pair regex")
});
static EQUALS_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z][A-Za-z0-9_]*)\s*=\s*([^\s,"]+)"#).expect("invalid pair regex")
});
// Value must start with a letter so clock times never read as pairs.
static COLON_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z][A-Za-z0-9_]*):\s*([A-Za-z][\w-]*)\b").expect("invalid pair regex")
});

/// Mine `key="value"`, `key=value` and `key: value` pairs from the
/// utterance. Quoted pairs win over unquoted ones for the same key.
fn mine_inline_pairs(text: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for caps in QUOTED_PAIR.captures_iter(text) {
        out.insert(caps[1].to_string(), Value::String(caps[2].to_string()));
    }
    for caps in EQUALS_PAIR.captures_iter(text) {
        out.entry(caps[1].to_string())
            .or_insert_with(|| Value::String(caps[2].to_string()));
    }
    for caps in COLON_PAIR.captures_iter(text) {
        out.entry(caps[1].to_string())
            .or_insert_with(|| Value::String(caps[2].to_string()));
    }
    out.remove("id");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::heathrow_fixture;
    use chrono::Utc;
    use serde_json::json;

    fn today() -> NaiveDate {
        // 2025-06-04 is a Wednesday.
        NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
    }

    fn processor() -> OperationProcessor {
        OperationProcessor::new(Some(Arc::new(heathrow_fixture())), NluConfig::default())
    }

    fn parsed(intent: &str, raw_text: &str, entries: &[(&str, EntityValue)]) -> ParsedQuery {
        let mut entities = Entities::new();
        for (key, value) in entries {
            entities.insert((*key).to_string(), value.clone());
        }
        ParsedQuery {
            intent: intent.to_string(),
            confidence: 0.85,
            entities,
            raw_text: raw_text.to_string(),
            timestamp: Utc::now(),
            conversation_id: None,
            alternative_intent: None,
            alternative_confidence: None,
        }
    }

    fn text(v: &str) -> EntityValue {
        EntityValue::Text(v.to_string())
    }

    // ── inline mining ────────────────────────────────────────────

    #[test]
    fn mines_quoted_and_unquoted_pairs() {
        let pairs = mine_inline_pairs(r#"set name="North 1" capacity=5 status: active"#);
        assert_eq!(pairs["name"], json!("North 1"));
        assert_eq!(pairs["capacity"], json!("5"));
        assert_eq!(pairs["status"], json!("active"));
    }

    #[test]
    fn clock_times_are_not_pairs() {
        let pairs = mine_inline_pairs("move it to 14:30 please");
        assert!(pairs.is_empty());
    }

    // ── specialisation ───────────────────────────────────────────

    #[tokio::test]
    async fn delete_stand_produces_confirmation() {
        let p = processor();
        let out = p
            .process(&parsed("delete.stand", "Delete stand A1", &[("stand", text("A1"))]))
            .await;
        let op = out.data.unwrap();
        assert_eq!(op.operation_type, OperationKind::Delete);
        assert_eq!(op.entity_type, "stand");
        assert_eq!(op.parameters["id"], json!("A1"));
        assert!(op.requires_confirmation);
        assert_eq!(
            op.confirmation_message.as_deref(),
            Some("Delete stand \"A1\"?")
        );
    }

    #[tokio::test]
    async fn soft_delete_and_cascade_flags() {
        let p = processor();
        let out = p
            .process(&parsed(
                "delete.stand",
                "Remove stand A1, mark as deleted, with related records",
                &[("stand", text("A1"))],
            ))
            .await;
        let op = out.data.unwrap();
        assert_eq!(op.parameters["softDelete"], json!(true));
        assert_eq!(op.parameters["cascade"], json!(true));
    }

    #[tokio::test]
    async fn create_stand_complete_with_confirmation() {
        let p = processor();
        let out = p
            .process(&parsed(
                "create.stand",
                "Create a stand called \"North Remote 1\" in terminal 2",
                &[("name", text("North Remote 1")), ("terminal", text("T2"))],
            ))
            .await;
        let op = out.data.unwrap();
        assert!(op.parameter_status.is_complete);
        assert_eq!(
            op.confirmation_message.as_deref(),
            Some("Create a new stand named \"North Remote 1\" in terminal T2?")
        );
    }

    #[tokio::test]
    async fn create_stand_missing_terminal_is_incomplete() {
        let p = processor();
        let out = p
            .process(&parsed(
                "create.stand",
                "Create a stand called \"North Remote 1\"",
                &[("name", text("North Remote 1"))],
            ))
            .await;
        let op = out.data.unwrap();
        assert!(!op.parameter_status.is_complete);
        assert_eq!(op.parameter_status.missing_params, vec!["terminal"]);
        assert!(op.confirmation_message.is_none());
    }

    #[tokio::test]
    async fn create_maintenance_resolves_dates() {
        let p = processor();
        let out = p
            .specialise(
                &parsed(
                    "create.maintenance",
                    "Schedule maintenance for stand A1 from tomorrow until next friday",
                    &[
                        ("standId", text("A1")),
                        ("startDate", text("tomorrow")),
                        ("endDate", text("next friday")),
                        ("reason", text("surface repairs")),
                        ("priority", text("high")),
                    ],
                ),
                today(),
            )
            .await
            .unwrap();
        assert_eq!(out.parameters["startDate"], json!("2025-06-05"));
        assert_eq!(out.parameters["endDate"], json!("2025-06-06"));
        assert_eq!(
            out.confirmation_message.as_deref(),
            Some("Schedule maintenance for stand A1 from 2025-06-05 to 2025-06-06?")
        );
    }

    #[tokio::test]
    async fn maintenance_end_before_start_fails_validation() {
        let p = processor();
        let result = p
            .specialise(
                &parsed(
                    "create.maintenance",
                    "Schedule maintenance for stand A1",
                    &[
                        ("standId", text("A1")),
                        ("startDate", text("2025-06-10")),
                        ("endDate", text("2025-06-05")),
                    ],
                ),
                today(),
            )
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn update_stand_collects_fields_to_update() {
        let p = processor();
        let out = p
            .process(&parsed(
                "update.stand",
                "Update stand A1 status: active capacity=5",
                &[("stand", text("A1")), ("status", text("active"))],
            ))
            .await;
        let op = out.data.unwrap();
        assert_eq!(op.parameters["id"], json!("A1"));
        let fields = op.fields_to_update.unwrap();
        assert_eq!(fields["status"], json!("active"));
        assert_eq!(fields["capacity"], json!(5));
        assert!(op.parameter_status.is_complete);
    }

    #[tokio::test]
    async fn update_without_changes_is_incomplete() {
        let p = processor();
        let out = p
            .process(&parsed("update.stand", "Update stand A1", &[("stand", text("A1"))]))
            .await;
        let op = out.data.unwrap();
        assert!(!op.parameter_status.is_complete);
        assert!(op
            .parameter_status
            .missing_params
            .contains(&"fieldsToUpdate".to_string()));
    }

    #[tokio::test]
    async fn update_merges_embedded_json_into_fields() {
        let p = OperationProcessor::new(
            Some(Arc::new(
                heathrow_fixture().with_entity("maintenance", "MR-42"),
            )),
            NluConfig::default(),
        );
        let out = p
            .process(&parsed(
                "update.maintenance",
                r#"Update maintenance MR-42 with {"priority": "low", "reason": "crew shortage"}"#,
                &[("id", text("MR-42")), ("code", text("MR-42"))],
            ))
            .await;
        let op = out.data.unwrap();
        assert_eq!(op.parameters["id"], json!("MR-42"));
        let fields = op.fields_to_update.unwrap();
        assert_eq!(fields["priority"], json!("low"));
        assert_eq!(fields["reason"], json!("crew shortage"));
        assert!(op.parameter_status.is_complete);
    }

    #[tokio::test]
    async fn update_of_unknown_maintenance_fails_validation() {
        let p = processor();
        let out = p
            .process(&parsed(
                "update.maintenance",
                r#"Update maintenance MR-42 with {"priority": "low"}"#,
                &[("id", text("MR-42")), ("code", text("MR-42"))],
            ))
            .await;
        assert_eq!(out.error_code(), Some("VALIDATION_FAILED")); // MR-42 unknown
    }

    #[tokio::test]
    async fn unknown_stand_reference_fails() {
        let p = processor();
        let out = p
            .process(&parsed("delete.stand", "Delete stand Z9", &[("stand", text("Z9"))]))
            .await;
        assert_eq!(out.error_code(), Some("VALIDATION_FAILED"));
        let details = out.metadata.error.unwrap().details.unwrap();
        assert_eq!(details["problems"][0], "unknown stand: Z9");
    }

    #[tokio::test]
    async fn unknown_operation_type_message_is_exact() {
        let p = processor();
        let out = p
            .process(&parsed("delete.flight", "Cancel flight BA123", &[]))
            .await;
        let err = out.metadata.error.unwrap();
        assert_eq!(
            err.details.unwrap()["problems"][0],
            "No validation schema found for operation type: delete_flight"
        );
    }

    #[tokio::test]
    async fn list_stands_is_a_read_without_confirmation() {
        let p = processor();
        let out = p
            .process(&parsed(
                "list.stands",
                "list stands where status=active sorted by name desc",
                &[
                    ("status", text("active")),
                    ("sortBy", text("name")),
                    ("orderDirection", text("desc")),
                ],
            ))
            .await;
        let op = out.data.unwrap();
        assert_eq!(op.operation_type, OperationKind::Read);
        assert!(!op.requires_confirmation);
        assert!(op.confirmation_message.is_none());
        assert!(op.parameter_status.is_complete);
        assert_eq!(op.parameters["orderDirection"], json!("desc"));
    }
}
