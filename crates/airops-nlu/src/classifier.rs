//! Intent classification: deterministic rules first, LLM fallback.
//!
//! A rule hit at or above the high-confidence threshold short-circuits
//! the AI stage entirely. When both stages produce a result, the AI wins
//! if it clears the medium band, otherwise the higher score wins; the
//! loser is reported as the alternative.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NluConfig;
use crate::errors::NluError;
use crate::intents::{self, Category};
use crate::llm::{first_json_object, ChatMessage, ChatRequest, LanguageModel};
use crate::parser::Context;
use crate::processor::{Outcome, ProcessorMetrics, StageTimer};

pub const PROCESSOR: &str = "intent-classifier";

const RULE_REGEX_CONFIDENCE: f64 = 0.85;
const RULE_KEYWORD_CONFIDENCE: f64 = 0.75;
const AI_TEMPERATURE: f64 = 0.3;

/// Classification result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedIntent {
    pub intent: String,
    pub confidence: f64,
    /// `"rules"` or `"ai"`.
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_confidence: Option<f64>,
    pub category: Option<Category>,
    /// Populated for CRUD intents only.
    #[serde(flatten)]
    pub crud: Option<CrudHints>,
}

/// Extra routing facts derived from a CRUD intent name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrudHints {
    pub operation_type: &'static str,
    pub entity_type: String,
    pub is_list: bool,
    pub requires_confirmation: bool,
}

struct RuleGroup {
    patterns: Vec<Regex>,
    intent: &'static str,
}

fn group(intent: &'static str, patterns: &[&str]) -> RuleGroup {
    RuleGroup {
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).expect("invalid intent rule regex"))
            .collect(),
        intent,
    }
}

/// Regex rule groups, declared order. CRUD verbs are anchored at the
/// start of the utterance and checked before the read-only intents so
/// "delete stand A1" never lands on stand.details.
static RULE_GROUPS: Lazy<Vec<RuleGroup>> = Lazy::new(|| {
    vec![
        // ── crud, verb-anchored ──────────────────────────────────
        group(
            "create.maintenance",
            &[r"^(?:create|add|schedule)\b.*\bmaintenance\b"],
        ),
        group(
            "create.stand",
            &[r"^(?:create|add)\b.*\bstand\b"],
        ),
        group(
            "create.terminal",
            &[r"^(?:create|add)\b.*\bterminal\b"],
        ),
        group(
            "list.maintenances",
            &[r"^(?:list|show|view)\b.*\bmaintenance\b.*\b(?:requests|records|all)\b"],
        ),
        group(
            "list.stands",
            &[r"^(?:list|show|view)\b.*\bstands\b", r"^list\b.*\bstand\b"],
        ),
        group("get.stand", &[r"^(?:get|show|view)\b.*\bstand\b"]),
        group(
            "get.maintenance",
            &[r"^(?:get|show|view)\b.*\bmaintenance\b"],
        ),
        group(
            "update.maintenance",
            &[r"^(?:update|edit|modify|change)\b.*\bmaintenance\b"],
        ),
        group(
            "update.stand",
            &[r"^(?:update|edit|modify|change)\b.*\bstand\b"],
        ),
        group(
            "update.terminal",
            &[r"^(?:update|edit|modify|change)\b.*\bterminal\b"],
        ),
        group(
            "delete.maintenance",
            &[r"^(?:delete|remove|cancel|clear)\b.*\bmaintenance\b"],
        ),
        group(
            "delete.stand",
            &[r"^(?:delete|remove|cancel|clear)\b.*\bstand\b"],
        ),
        group(
            "delete.terminal",
            &[r"^(?:delete|remove|cancel|clear)\b.*\bterminal\b"],
        ),
        // ── asset ────────────────────────────────────────────────
        group(
            "stand.availability",
            &[
                r"\bis\b.*\bstand\b.*\b(?:free|available)\b",
                r"\bstand\b.*\bavailab",
            ],
        ),
        group(
            "stand.status",
            &[r"\bstatus\b.*\bstand\b", r"\bstand\b.*\bstatus\b", r"\bis\b.*\bstand\b.*\boccupied\b"],
        ),
        group(
            "stand.nearest",
            &[r"\b(?:nearest|closest)\b.*\bstand\b", r"\bstand\b.*\b(?:nearest|closest)\b"],
        ),
        group(
            "stand.details",
            &[
                r"\b(?:tell me about|details? (?:of|for|about)|about|info(?:rmation)? on)\b.*\bstand\b",
                r"\bstand\s+\w+\s+details?\b",
            ],
        ),
        group(
            "terminal.stands",
            &[r"\b(?:which|what|list|show)\b.*\bstands\b.*\b(?:terminal|t\d)\b"],
        ),
        group(
            "terminal.details",
            &[r"\b(?:tell me about|details? (?:of|for|about)|about)\b.*\bterminal\b"],
        ),
        group(
            "pier.details",
            &[r"\b(?:tell me about|details? (?:of|for|about)|about)\b.*\bpier\b"],
        ),
        // ── maintenance ──────────────────────────────────────────
        group(
            "maintenance.status",
            &[r"\b(?:is|under)\b.*\bmaintenance\b", r"\bmaintenance status\b"],
        ),
        group(
            "maintenance.schedule",
            &[r"\bwhen\b.*\bmaintenance\b", r"\bmaintenance schedule\b"],
        ),
        // ── reference ────────────────────────────────────────────
        group(
            "aircraft.stands",
            &[
                r"\bcan an?\b.*\b(?:use|park|fit)\b.*\bstand\b",
                r"\bstands?\b.*\bfor\b.*\b(?:aircraft|size)\b",
                r"\bwhich stands\b.*\b(?:accept|take|handle)\b",
            ],
        ),
        group(
            "airport.search",
            &[r"\b(?:find|search)\b.*\bairports?\b"],
        ),
        group(
            "airport.details",
            &[r"\b(?:tell me about|details? (?:of|for|about)|about)\b.*\bairport\b"],
        ),
        group(
            "flight.details",
            &[r"\b(?:where is|track|details? (?:of|for))\b.*\bflight\b", r"\bflight\s+[a-z]{2}\d+"],
        ),
        // ── operational ──────────────────────────────────────────
        group(
            "capacity.summary",
            &[r"\bcapacity\b"],
        ),
        group(
            "utilization.summary",
            &[r"\butili[sz]ation\b"],
        ),
    ]
});

/// Keyword fallback pairs, declared order, substring match.
static KEYWORD_RULES: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("maintenance.list", vec!["maintenance requests", "open maintenance"]),
        ("stand.details", vec!["stand details", "about stand"]),
        ("stand.list", vec!["all stands", "list of stands"]),
        ("airport.details", vec!["airport details", "airport info"]),
        ("airline.details", vec!["airline", "carrier"]),
        ("aircraft.details", vec!["aircraft type", "plane type"]),
        ("flight.details", vec!["flight"]),
        ("capacity.summary", vec!["capacity"]),
    ]
});

/// Hybrid rule + LLM intent classifier.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LanguageModel>>,
    config: NluConfig,
    metrics: ProcessorMetrics,
}

#[derive(Debug, Clone)]
struct StageResult {
    intent: String,
    confidence: f64,
    method: &'static str,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, config: NluConfig) -> Self {
        Self {
            llm,
            config,
            metrics: ProcessorMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// Classify an utterance.
    pub async fn process(&self, text: &str, context: &Context) -> Outcome<ClassifiedIntent> {
        let timer = StageTimer::start(PROCESSOR, &self.metrics, self.config.enable_metrics);
        let result = self.classify(text, context).await;
        timer.finish(result.is_ok());
        match result {
            Ok(classified) => Outcome::ok(PROCESSOR, classified),
            Err(err) => Outcome::err(PROCESSOR, &err),
        }
    }

    async fn classify(
        &self,
        text: &str,
        context: &Context,
    ) -> Result<ClassifiedIntent, NluError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NluError::InvalidInput("empty query text".into()));
        }

        let rule_result = Self::rule_stage(trimmed);

        // Rule high-confidence short-circuit: no LLM call.
        if let Some(ref rules) = rule_result {
            if rules.confidence >= self.config.high_confidence_threshold {
                debug!(intent = %rules.intent, "rule stage short-circuit");
                return Ok(self.finish(rules.clone(), None));
            }
        }

        let ai_result = match self.llm {
            Some(ref llm) if llm.is_available() => {
                self.ai_stage(llm.as_ref(), trimmed, context).await
            }
            _ => None,
        };

        match (rule_result, ai_result) {
            (Some(rules), Some(ai)) => {
                // Prefer AI when it clears the medium band, otherwise the
                // higher-confidence stage.
                let ai_wins = ai.confidence >= self.config.confidence_threshold
                    || ai.confidence > rules.confidence;
                if ai_wins {
                    Ok(self.finish(ai, Some(rules)))
                } else {
                    Ok(self.finish(rules, Some(ai)))
                }
            }
            (Some(rules), None) => Ok(self.finish(rules, None)),
            (None, Some(ai)) => Ok(self.finish(ai, None)),
            (None, None) => Err(NluError::ClassificationFailed(trimmed.to_string())),
        }
    }

    fn finish(&self, primary: StageResult, alternative: Option<StageResult>) -> ClassifiedIntent {
        let category = intents::category_of(&primary.intent);
        let crud = (category == Some(Category::Crud))
            .then(|| crud_hints(&primary.intent))
            .flatten();
        ClassifiedIntent {
            intent: primary.intent,
            confidence: primary.confidence,
            method: primary.method,
            alternative_intent: alternative.as_ref().map(|a| a.intent.clone()),
            alternative_confidence: alternative.as_ref().map(|a| a.confidence),
            category,
            crud,
        }
    }

    /// Deterministic stage: regex groups first, then keyword substrings.
    fn rule_stage(text: &str) -> Option<StageResult> {
        let lower = text.to_lowercase();

        for group in RULE_GROUPS.iter() {
            if group.patterns.iter().any(|p| p.is_match(&lower)) {
                return Some(StageResult {
                    intent: group.intent.to_string(),
                    confidence: RULE_REGEX_CONFIDENCE,
                    method: "rules",
                });
            }
        }

        for (intent, keywords) in KEYWORD_RULES.iter() {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return Some(StageResult {
                    intent: intent.to_string(),
                    confidence: RULE_KEYWORD_CONFIDENCE,
                    method: "rules",
                });
            }
        }

        None
    }

    /// LLM stage. Any failure is logged and absorbed; the caller falls
    /// back to the rule result.
    async fn ai_stage(
        &self,
        llm: &dyn LanguageModel,
        text: &str,
        context: &Context,
    ) -> Option<StageResult> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(build_system_prompt(context)),
                ChatMessage::user(text.to_string()),
            ],
            temperature: AI_TEMPERATURE,
            max_tokens: 100,
        };

        let response = match llm.chat_completion(request).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "intent LLM call failed, using rule result");
                return None;
            }
        };

        let json = first_json_object(&response)?;
        let confidence = json.get("confidence").and_then(|c| c.as_f64())?;
        let intent = match json.get("intent") {
            Some(serde_json::Value::String(name)) => name.clone(),
            _ => {
                // Model explicitly declined: null intent with zero
                // confidence is a rejection, not a result.
                return None;
            }
        };

        // "unknown" is the model's explicit can't-classify answer; it is
        // kept so the parser's confidence gate reports LOW_CONFIDENCE
        // instead of a hard classification failure.
        if intent != "unknown" && intents::lookup(&intent).is_none() {
            warn!(intent = %intent, "LLM returned unknown intent, discarding");
            return None;
        }

        Some(StageResult {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            method: "ai",
        })
    }
}

/// Derive operation hints from a CRUD intent name.
pub fn crud_hints(intent: &str) -> Option<CrudHints> {
    let (verb, entity) = intents::split_crud(intent)?;
    let operation_type = if intents::CREATE_VERBS.contains(&verb) {
        "create"
    } else if intents::READ_VERBS.contains(&verb) {
        "read"
    } else if intents::UPDATE_VERBS.contains(&verb) {
        "update"
    } else {
        "delete"
    };
    let is_list = verb == "list" || entity.ends_with('s');
    let entity_type = entity.trim_end_matches('s').to_string();
    Some(CrudHints {
        operation_type,
        entity_type,
        is_list,
        requires_confirmation: matches!(operation_type, "create" | "update" | "delete"),
    })
}

/// System prompt enumerating the catalogue, with recent-intent context.
fn build_system_prompt(context: &Context) -> String {
    let mut lines = Vec::new();
    lines.push(
        "You classify airport operations queries into exactly one intent. Known intents:"
            .to_string(),
    );
    for def in intents::catalogue() {
        lines.push(format!("- {}: {}", def.name, def.description));
    }

    let recent: Vec<&str> = context
        .recent_queries
        .iter()
        .rev()
        .take(3)
        .map(|q| q.intent.as_str())
        .collect();
    if !recent.is_empty() {
        lines.push(format!("Recent intents in this conversation: {}", recent.join(", ")));
    }

    lines.push(
        "Respond with one JSON object: {\"intent\": \"<name>\" | null, \"confidence\": <0..1>}. \
         Use null with confidence 0 when nothing fits."
            .to_string(),
    );
    lines.join("\n")
}
