//! Parameter coercion, constraint checks and reference validation.
//!
//! Coercion is permissive: strings are accepted for number, boolean and
//! date fields when they parse. Every problem is collected rather than
//! failing fast, so the caller can report the whole list at once.

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use airops_reference::ReferenceRepository;

use crate::entities::datetime::resolve_date;

use super::schema::{field_rule, FieldRule, FieldType, OperationSchema};

/// Coerce and constraint-check every parameter that has a field rule.
/// Parameters without a rule pass through unchanged.
pub fn coerce_and_check(
    schema: &'static OperationSchema,
    params: &Map<String, Value>,
    today: NaiveDate,
) -> (Map<String, Value>, Vec<String>) {
    let mut normalised = Map::new();
    let mut problems = Vec::new();

    for (key, value) in params {
        match field_rule(schema, key) {
            Some(rule) => match coerce(rule, value, today) {
                Ok(coerced) => {
                    if let Some(problem) = check_constraints(rule, &coerced) {
                        problems.push(problem);
                    }
                    normalised.insert(key.clone(), coerced);
                }
                Err(problem) => {
                    problems.push(problem);
                    normalised.insert(key.clone(), value.clone());
                }
            },
            None => {
                normalised.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some((start_key, end_key)) = schema.date_pair {
        if let Some(problem) = check_date_order(&normalised, start_key, end_key) {
            problems.push(problem);
        }
    }

    (normalised, problems)
}

fn coerce(rule: &FieldRule, value: &Value, today: NaiveDate) -> Result<Value, String> {
    match rule.field_type {
        FieldType::Text => Ok(match value {
            Value::String(_) => value.clone(),
            other => Value::String(render(other)),
        }),
        FieldType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    Ok(Value::Number(i.into()))
                } else if let Ok(f) = s.trim().parse::<f64>() {
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .ok_or_else(|| type_problem(rule))
                } else {
                    Err(type_problem(rule))
                }
            }
            _ => Err(type_problem(rule)),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(type_problem(rule)),
            },
            _ => Err(type_problem(rule)),
        },
        FieldType::Date => match value {
            Value::String(s) => resolve_date(s, today)
                .map(Value::String)
                .ok_or_else(|| type_problem(rule)),
            _ => Err(type_problem(rule)),
        },
        FieldType::Array => Ok(match value {
            Value::Array(_) => value.clone(),
            Value::String(s) => Value::Array(
                s.split(',')
                    .map(|part| Value::String(part.trim().to_string()))
                    .filter(|v| v.as_str().map(|s| !s.is_empty()).unwrap_or(true))
                    .collect(),
            ),
            other => Value::Array(vec![other.clone()]),
        }),
    }
}

fn check_constraints(rule: &FieldRule, value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        other => render(other),
    };

    if !rule.allowed.is_empty() && !rule.allowed.contains(&text.to_lowercase().as_str()) {
        return Some(rule.message.map(str::to_string).unwrap_or_else(|| {
            format!("{} must be one of: {}", rule.name, rule.allowed.join(", "))
        }));
    }

    if let Some(pattern) = rule.pattern {
        if let Ok(regex) = Regex::new(pattern) {
            if !regex.is_match(&text) {
                return Some(
                    rule.message
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} has an invalid format", rule.name)),
                );
            }
        }
    }

    None
}

fn check_date_order(
    params: &Map<String, Value>,
    start_key: &str,
    end_key: &str,
) -> Option<String> {
    let start = params.get(start_key)?.as_str()?;
    let end = params.get(end_key)?.as_str()?;
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    if end < start {
        Some(format!("{} must be on or after {}", end_key, start_key))
    } else {
        None
    }
}

fn type_problem(rule: &FieldRule) -> String {
    rule.message
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} must be a {}", rule.name, rule.field_type.as_str()))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check the schema's reference pairs against the registry.
///
/// A missing record is always a problem; a missing or failing registry
/// is one only under `strict`.
pub async fn check_references(
    schema: &'static OperationSchema,
    params: &Map<String, Value>,
    reference: Option<&dyn ReferenceRepository>,
    strict: bool,
) -> Vec<String> {
    let mut problems = Vec::new();

    for (param, kind) in schema.reference_checks {
        let Some(value) = params.get(*param) else {
            continue;
        };
        let id = render(value);

        let Some(reference) = reference else {
            if strict {
                problems.push(format!(
                    "cannot verify {} {}: reference service unavailable",
                    kind, id
                ));
            }
            continue;
        };

        match reference.entity_exists(kind, &id).await {
            Ok(true) => {}
            Ok(false) => problems.push(format!("unknown {}: {}", kind, id)),
            Err(err) => {
                warn!(kind = %kind, id = %id, error = %err, "reference check failed");
                if strict {
                    problems.push(format!("could not verify {} {}", kind, id));
                }
            }
        }
    }

    problems
}
