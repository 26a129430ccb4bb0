//! Entity kinds, values and the declarative extraction table.
//!
//! Each entity kind declares ordered regex alternatives, an extraction
//! mode, a normaliser and an optional parser. The extractor runs the
//! table in declared order over the raw utterance; ambiguity between the
//! bare-code kinds (pier letters, 2/3-letter codes, 3-digit aircraft
//! types) is handled by keyword gates on individual alternatives and by
//! the merge step, never by reordering the table at runtime.

pub mod datetime;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Values
// ============================================================================

/// Typed entity value.
///
/// Dates are ISO `YYYY-MM-DD` text, times `HH:MM` text and durations
/// integral minutes, matching the wire shape consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<EntityValue>),
}

impl EntityValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Scalar rendering used in confirmation prompts and cache keys.
    pub fn render(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(|v| v.render())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Append `value` unless already present, promoting a scalar to a
    /// list. Insertion order is preserved.
    pub fn push_unique(self, value: EntityValue) -> EntityValue {
        match self {
            Self::List(mut items) => {
                if !items.contains(&value) {
                    items.push(value);
                }
                Self::List(items)
            }
            scalar if scalar == value => scalar,
            scalar => Self::List(vec![scalar, value]),
        }
    }

    /// Collapse single-element lists back to scalars.
    pub fn collapse(self) -> EntityValue {
        match self {
            Self::List(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        }
    }
}

/// The keyed entity bag. Only the extractor boundary speaks this type;
/// operations project it into typed parameter records.
pub type Entities = BTreeMap<String, EntityValue>;

// ============================================================================
// Kinds
// ============================================================================

/// Every entity kind the extractor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Stand,
    Terminal,
    Pier,
    Airport,
    Airline,
    AircraftType,
    Date,
    Time,
    Duration,
    Boolean,
    Number,
    Limit,
    Format,
    // Operation-extraction extensions.
    Name,
    Code,
    Location,
    Type,
    Capacity,
    Status,
    Priority,
    Description,
    Reason,
    Features,
    Id,
    StartDate,
    EndDate,
    FlightNumber,
    StandId,
    SortBy,
    OrderDirection,
    FilterBy,
}

impl EntityKind {
    /// Bag key, camelCase to match the external contract.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Stand => "stand",
            Self::Terminal => "terminal",
            Self::Pier => "pier",
            Self::Airport => "airport",
            Self::Airline => "airline",
            Self::AircraftType => "aircraftType",
            Self::Date => "date",
            Self::Time => "time",
            Self::Duration => "duration",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Limit => "limit",
            Self::Format => "format",
            Self::Name => "name",
            Self::Code => "code",
            Self::Location => "location",
            Self::Type => "type",
            Self::Capacity => "capacity",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Description => "description",
            Self::Reason => "reason",
            Self::Features => "features",
            Self::Id => "id",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
            Self::FlightNumber => "flightNumber",
            Self::StandId => "standId",
            Self::SortBy => "sortBy",
            Self::OrderDirection => "orderDirection",
            Self::FilterBy => "filterBy",
        }
    }

    /// Reverse of `key`, for AI-stage responses.
    pub fn from_key(key: &str) -> Option<Self> {
        KIND_TABLE.iter().map(|s| s.kind).find(|k| k.key() == key)
    }
}

// ============================================================================
// Extraction Table
// ============================================================================

/// How to derive the raw value from a regex match.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    /// First non-empty capture group, else whole match.
    Group,
    /// Whole match text.
    Whole,
    /// Two groups joined as `field=value`.
    Pair,
}

/// One regex alternative for a kind.
pub struct Alternative {
    regex: Regex,
    /// The alternative only runs when this word occurs (case-insensitive)
    /// in the utterance. Gates the ambiguous bare patterns.
    requires_keyword: Option<&'static str>,
}

/// Declarative spec for one entity kind.
pub struct KindSpec {
    pub kind: EntityKind,
    pub description: &'static str,
    alternatives: Vec<Alternative>,
    capture: Capture,
    /// Free-text kinds stop at the first alternative that matched, so
    /// overlapping alternatives never split one logical value in two.
    first_alt_only: bool,
}

fn alt(pattern: &str) -> Alternative {
    Alternative {
        regex: Regex::new(pattern).expect("invalid entity regex"),
        requires_keyword: None,
    }
}

fn gated(pattern: &str, keyword: &'static str) -> Alternative {
    Alternative {
        regex: Regex::new(pattern).expect("invalid entity regex"),
        requires_keyword: Some(keyword),
    }
}

const DATE_PHRASE: &str = r"today|tomorrow|yesterday|next\s+\w+|\d{4}-\d{2}-\d{2}";

/// The full kind table, in declared extraction order.
static KIND_TABLE: Lazy<Vec<KindSpec>> = Lazy::new(|| {
    vec![
        KindSpec {
            kind: EntityKind::Stand,
            description: "Aircraft stand or gate identifier, e.g. A1 or T1A12",
            alternatives: vec![
                alt(r"(?i)\b(?:stand|gate)\s+([A-Za-z]?\d+[A-Za-z]?\d*)\b"),
                alt(r"\b(T\d[A-Z]\d+)\b"),
                // Bare <letter><digits>; T is excluded because T<n> is a
                // terminal identifier.
                alt(r"\b([A-SU-Z]\d{1,3})\b"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Terminal,
            description: "Terminal identifier, e.g. T2 or terminal 2",
            alternatives: vec![
                alt(r"\bT(\d{1,2})\b"),
                alt(r"(?i)\bterminal\s+(\d{1,2})\b"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Pier,
            description: "Pier letter, e.g. pier B",
            alternatives: vec![
                alt(r"(?i)\bpier\s+([A-Za-z])\b"),
                gated(r"\b([A-Z])\b", "pier"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Airport,
            description: "Airport 3-letter IATA code, e.g. LHR",
            alternatives: vec![
                alt(r"(?i)\bairport\s+([A-Za-z]{3})\b"),
                alt(r"\b([A-Z]{3})\b"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Airline,
            description: "Airline 2-letter IATA code, e.g. BA",
            alternatives: vec![
                alt(r"(?i)\bairline\s+([A-Za-z0-9]{2})\b"),
                alt(r"\b([A-Z]{2})\b"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::AircraftType,
            description: "Aircraft type designator, e.g. 777 or A320",
            alternatives: vec![
                alt(r"\b([A-Z]\d{2}\d?)\b"),
                alt(r"\b(\d{3})\b"),
            ],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Date,
            description: "Date: today/tomorrow/yesterday, next <weekday>, or YYYY-MM-DD",
            alternatives: vec![
                alt(r"(?i)\b(?:today|tomorrow|yesterday)\b"),
                alt(r"(?i)\bnext\s+(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b"),
                alt(r"\b\d{4}-\d{2}-\d{2}\b"),
            ],
            capture: Capture::Whole,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Time,
            description: "Time of day, 24-hour HH:MM or 2pm form",
            alternatives: vec![
                alt(r"\b(?:[01]?\d|2[0-3]):[0-5]\d\b"),
                alt(r"(?i)\b(?:1[0-2]|[1-9])\s*(?:am|pm)\b"),
            ],
            capture: Capture::Whole,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Duration,
            description: "Duration, e.g. 2 hours or 45 min",
            alternatives: vec![alt(r"(?i)\b\d+\s*(?:hours?|hrs?|minutes?|mins?|days?)\b")],
            capture: Capture::Whole,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Boolean,
            description: "Boolean literal: true/false/yes/no",
            alternatives: vec![alt(r"(?i)\b(true|false|yes|no)\b")],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Number,
            description: "Plain number",
            alternatives: vec![alt(r"\b(\d+(?:\.\d+)?)\b")],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Limit,
            description: "Result limit, e.g. top 5",
            alternatives: vec![alt(r"(?i)\b(?:top|first|limit)\s+(\d+)\b")],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::Format,
            description: "Requested output format",
            alternatives: vec![alt(
                r"(?i)\b(?:as|in|format)\s+(?:a\s+)?(json|csv|table|chart|summary)\b",
            )],
            capture: Capture::Group,
            first_alt_only: false,
        },
        // ── operation-extraction extensions ──────────────────────
        KindSpec {
            kind: EntityKind::Name,
            description: "Display name for a created or updated record",
            alternatives: vec![
                alt(r#"(?i)\b(?:named?|called)\s+"([^"]+)""#),
                alt(r"(?i)\b(?:named?|called)\s+([A-Za-z0-9][\w-]*)"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Code,
            description: "Short code for a record",
            alternatives: vec![alt(r"(?i)\bcode\s*[=:]?\s*([A-Za-z0-9_-]+)")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Location,
            description: "Free-text location",
            alternatives: vec![
                alt(r"(?i)\b(?:located\s+(?:at|in)|location\s*[=:])\s*([\w][\w -]*?)(?:[.,;]|\s+(?:with|and)\b|$)"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Type,
            description: "Record type/classification",
            alternatives: vec![
                alt(r"(?i)\btype\s*[=:]\s*([\w-]+)"),
                alt(r"(?i)\btype\s+(?:to\s+)?([\w-]+)"),
                alt(r"(?i)\b(contact|remote|cargo)\s+stand\b"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Capacity,
            description: "Numeric capacity",
            alternatives: vec![alt(r"(?i)\bcapacity\s*(?:of\s+|[=:]\s*)?(\d+)")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Status,
            description: "Record status value",
            alternatives: vec![
                alt(r"(?i)\bstatus\s*(?:to\s+|[=:]\s*)?([\w-]+)"),
                alt(r"(?i)\b(active|inactive|closed)\b"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Priority,
            description: "Priority: high, medium or low",
            alternatives: vec![
                alt(r"(?i)\b(high|medium|low|urgent|critical)\s+priority\b"),
                alt(r"(?i)\bpriority\s*(?:to\s+|of\s+|[=:]\s*)?(high|medium|low|urgent|critical)\b"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Description,
            description: "Free-text description",
            alternatives: vec![
                alt(r#"(?i)\bdescription\s*[=:]\s*"([^"]+)""#),
                alt(r"(?i)\bdescription\s*[=:]\s*([\w][\w -]*)"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Reason,
            description: "Reason for the operation",
            alternatives: vec![
                alt(r"(?i)\b(?:due to|because of)\s+(.+?)\s+(?:with|from|until|till|at|starting)\b"),
                alt(r"(?i)\b(?:due to|because of|reason\s*[=:])\s*(.+)$"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Features,
            description: "Feature list, comma/and/plus separated",
            alternatives: vec![alt(r"(?i)\bfeatures?\s*[=:]?\s+([^.?!]+)")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::Id,
            description: "Record identifier",
            alternatives: vec![
                alt(r"#([A-Za-z0-9-]+)"),
                alt(r"(?i)\bid\s*[=:]?\s*([A-Za-z0-9_-]+)"),
                alt(r"(?i)\b(?:request|maintenance)\s+((?:MR|WO)-\d+)\b"),
            ],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::StartDate,
            description: "Range start date",
            alternatives: vec![alt(&format!(
                r"(?i)\b(?:from|starting(?:\s+on)?|beginning)\s+({})\b",
                DATE_PHRASE
            ))],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::EndDate,
            description: "Range end date",
            alternatives: vec![alt(&format!(
                r"(?i)\b(?:until|till|through|ending(?:\s+on)?|to)\s+({})\b",
                DATE_PHRASE
            ))],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::FlightNumber,
            description: "Flight number, e.g. BA123",
            alternatives: vec![alt(r"\b([A-Z]{2}\d{1,4})\b")],
            capture: Capture::Group,
            first_alt_only: false,
        },
        KindSpec {
            kind: EntityKind::StandId,
            description: "Stand targeted by an operation",
            alternatives: vec![alt(r"(?i)\bstand\s+([A-Za-z]?\d+[A-Za-z]?\d*)\b")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::SortBy,
            description: "Sort field",
            alternatives: vec![alt(r"(?i)\bsort(?:ed)?\s+by\s+([\w]+)")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::OrderDirection,
            description: "Sort direction, asc or desc",
            alternatives: vec![alt(r"(?i)\b(ascending|descending|asc|desc)\b")],
            capture: Capture::Group,
            first_alt_only: true,
        },
        KindSpec {
            kind: EntityKind::FilterBy,
            description: "Filter as field/value pair",
            alternatives: vec![alt(
                r"(?i)\b(?:filter(?:ed)?\s+by|where)\s+([\w]+)\s*(?:=|:|\s+is)\s*([\w-]+)",
            )],
            capture: Capture::Pair,
            first_alt_only: true,
        },
    ]
});

/// The declarative kind table, declared order.
pub fn kind_table() -> &'static [KindSpec] {
    &KIND_TABLE
}

// ============================================================================
// Rule-Stage Extraction
// ============================================================================

/// Run the whole table over an utterance. Values are raw (normalised
/// text); parsing and validation happen after the AI merge.
pub fn extract_rules(text: &str) -> Entities {
    let lower = text.to_lowercase();
    let mut out = Entities::new();

    for spec in KIND_TABLE.iter() {
        let mut raws: Vec<String> = Vec::new();

        for alternative in &spec.alternatives {
            if let Some(keyword) = alternative.requires_keyword {
                if !lower.contains(keyword) {
                    continue;
                }
            }
            let mut hit = false;
            for caps in alternative.regex.captures_iter(text) {
                let raw = match spec.capture {
                    Capture::Whole => caps.get(0).map(|m| m.as_str().to_string()),
                    Capture::Group => caps
                        .iter()
                        .skip(1)
                        .flatten()
                        .next()
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_string()),
                    Capture::Pair => {
                        let field = caps.get(1).map(|m| m.as_str());
                        let value = caps.get(2).map(|m| m.as_str());
                        match (field, value) {
                            (Some(f), Some(v)) => Some(format!("{}={}", f, v)),
                            _ => None,
                        }
                    }
                };
                if let Some(raw) = raw {
                    let raw = normalise(spec.kind, &raw);
                    if !raw.is_empty() && !raws.contains(&raw) {
                        raws.push(raw);
                        hit = true;
                    }
                }
            }
            if hit && spec.first_alt_only {
                break;
            }
        }

        // Repeated-match rule: first hit scalar, further distinct hits
        // promote to an ordered sequence.
        let value = match raws.len() {
            0 => continue,
            1 => EntityValue::Text(raws.remove(0)),
            _ => EntityValue::List(raws.into_iter().map(EntityValue::Text).collect()),
        };
        out.insert(spec.kind.key().to_string(), value);
    }

    out
}

/// Kind-specific raw normalisation (codes uppercased, terminals `T<n>`).
pub fn normalise(kind: EntityKind, raw: &str) -> String {
    let trimmed = raw.trim();
    match kind {
        EntityKind::Stand
        | EntityKind::StandId
        | EntityKind::Pier
        | EntityKind::Airport
        | EntityKind::Airline
        | EntityKind::AircraftType
        | EntityKind::FlightNumber => trimmed.to_uppercase(),
        EntityKind::Terminal => {
            let upper = trimmed.to_uppercase();
            if upper.starts_with('T') {
                upper
            } else {
                format!("T{}", upper)
            }
        }
        EntityKind::Boolean
        | EntityKind::Status
        | EntityKind::Priority
        | EntityKind::OrderDirection
        | EntityKind::Format
        | EntityKind::SortBy
        | EntityKind::Type => trimmed.to_lowercase(),
        EntityKind::Date | EntityKind::StartDate | EntityKind::EndDate => {
            trimmed.to_lowercase()
        }
        _ => trimmed.to_string(),
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a raw value into its typed form. `None` means "keep the raw
/// value" for kinds without a parser, and "parse failure" for kinds with
/// one; the caller falls back to raw either way.
pub fn parse_value(kind: EntityKind, raw: &str, today: NaiveDate) -> Option<EntityValue> {
    match kind {
        EntityKind::Date | EntityKind::StartDate | EntityKind::EndDate => {
            datetime::resolve_date(raw, today).map(EntityValue::Text)
        }
        EntityKind::Time => datetime::parse_time(raw).map(EntityValue::Text),
        EntityKind::Duration => datetime::parse_duration_minutes(raw).map(EntityValue::Int),
        EntityKind::Boolean => match raw.to_lowercase().as_str() {
            "true" | "yes" => Some(EntityValue::Bool(true)),
            "false" | "no" => Some(EntityValue::Bool(false)),
            _ => None,
        },
        EntityKind::Number => {
            if let Ok(n) = raw.parse::<i64>() {
                Some(EntityValue::Int(n))
            } else {
                raw.parse::<f64>().ok().map(EntityValue::Float)
            }
        }
        EntityKind::Limit | EntityKind::Capacity => {
            raw.parse::<i64>().ok().map(EntityValue::Int)
        }
        EntityKind::Priority => match raw.to_lowercase().as_str() {
            "high" | "urgent" | "critical" => Some(EntityValue::text("high")),
            "medium" => Some(EntityValue::text("medium")),
            "low" => Some(EntityValue::text("low")),
            _ => None,
        },
        EntityKind::OrderDirection => match raw.to_lowercase().as_str() {
            "asc" | "ascending" => Some(EntityValue::text("asc")),
            "desc" | "descending" => Some(EntityValue::text("desc")),
            _ => None,
        },
        EntityKind::Features => {
            let items: Vec<EntityValue> = split_list(raw)
                .into_iter()
                .map(EntityValue::Text)
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(EntityValue::List(items))
            }
        }
        EntityKind::FilterBy => {
            let (field, value) = raw.split_once('=')?;
            Some(EntityValue::List(vec![
                EntityValue::text(field.trim()),
                EntityValue::text(value.trim()),
            ]))
        }
        _ => None,
    }
}

/// Split a feature-style list on commas, `and` and `+`.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '+')
        .flat_map(|chunk| chunk.split(" and "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Merge
// ============================================================================

/// Merge the AI-stage map into the rule-stage map.
///
/// Rule values win position: equal scalars collapse, differing scalars
/// promote to a sequence with the rule value first, sequences union in
/// order.
pub fn merge_entities(rules: Entities, ai: Entities) -> Entities {
    let mut merged = rules;
    for (key, ai_value) in ai {
        match merged.remove(&key) {
            None => {
                merged.insert(key, ai_value);
            }
            Some(rule_value) => {
                let combined = match (rule_value, ai_value) {
                    (EntityValue::List(rule_items), EntityValue::List(ai_items)) => {
                        let mut items = rule_items;
                        for item in ai_items {
                            if !items.contains(&item) {
                                items.push(item);
                            }
                        }
                        EntityValue::List(items)
                    }
                    (EntityValue::List(items), scalar) => {
                        EntityValue::List(items).push_unique(scalar)
                    }
                    (scalar, EntityValue::List(ai_items)) => {
                        let mut items = vec![scalar];
                        for item in ai_items {
                            if !items.contains(&item) {
                                items.push(item);
                            }
                        }
                        EntityValue::List(items)
                    }
                    (rule_scalar, ai_scalar) => rule_scalar.push_unique(ai_scalar),
                };
                merged.insert(key, combined);
            }
        }
    }
    merged
}
