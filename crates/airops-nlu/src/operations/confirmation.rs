//! Confirmation prompts for mutating operations.

use serde_json::{Map, Value};

use super::OperationKind;

/// Build the confirmation prompt for a mutating operation.
///
/// Well-known operations get fixed templates; anything else falls back
/// to a generic prompt carrying the parameter JSON.
pub fn message(
    kind: OperationKind,
    entity: &str,
    params: &Map<String, Value>,
    fields_to_update: Option<&Map<String, Value>>,
) -> String {
    match (kind, entity) {
        (OperationKind::Create, "stand") => format!(
            "Create a new stand named \"{}\" in terminal {}?",
            text(params, "name"),
            text(params, "terminal"),
        ),
        (OperationKind::Create, "maintenance") => format!(
            "Schedule maintenance for stand {} from {} to {}?",
            text(params, "standId"),
            text(params, "startDate"),
            text(params, "endDate"),
        ),
        (OperationKind::Update, "stand") => format!(
            "Update stand {} with the following changes: {}?",
            text(params, "id"),
            changes(fields_to_update),
        ),
        (OperationKind::Update, "maintenance") => format!(
            "Update maintenance request {} with the following changes: {}?",
            text(params, "id"),
            changes(fields_to_update),
        ),
        (OperationKind::Delete, "stand") => {
            format!("Delete stand \"{}\"?", text(params, "id"))
        }
        (OperationKind::Delete, "terminal") => {
            format!("Delete terminal \"{}\"?", text(params, "id"))
        }
        (OperationKind::Delete, "maintenance") => {
            format!("Delete maintenance request {}?", text(params, "id"))
        }
        _ => format!(
            "Confirm {} {} with parameters: {}?",
            kind.as_str(),
            entity,
            Value::Object(params.clone()),
        ),
    }
}

/// Changes listing; the identifier never appears here.
fn changes(fields: Option<&Map<String, Value>>) -> String {
    let Some(fields) = fields else {
        return String::from("(none)");
    };
    let parts: Vec<String> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "id")
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: \"{}\"", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect();
    if parts.is_empty() {
        String::from("(none)")
    } else {
        parts.join(", ")
    }
}

fn text(params: &Map<String, Value>, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::from("?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be a JSON object"),
        }
    }

    #[test]
    fn create_stand_template() {
        let params = object(json!({"name": "North Remote 1", "terminal": "T2"}));
        assert_eq!(
            message(OperationKind::Create, "stand", &params, None),
            "Create a new stand named \"North Remote 1\" in terminal T2?"
        );
    }

    #[test]
    fn create_maintenance_template() {
        let params = object(json!({
            "standId": "A1",
            "startDate": "2025-06-05",
            "endDate": "2025-06-06",
        }));
        assert_eq!(
            message(OperationKind::Create, "maintenance", &params, None),
            "Schedule maintenance for stand A1 from 2025-06-05 to 2025-06-06?"
        );
    }

    #[test]
    fn delete_stand_quotes_the_identifier() {
        let params = object(json!({"id": "A1"}));
        assert_eq!(
            message(OperationKind::Delete, "stand", &params, None),
            "Delete stand \"A1\"?"
        );
    }

    #[test]
    fn update_changes_omit_the_identifier() {
        let params = object(json!({"id": "A1"}));
        let fields = object(json!({"id": "A1", "status": "active", "capacity": 5}));
        let prompt = message(OperationKind::Update, "stand", &params, Some(&fields));
        assert!(prompt.starts_with("Update stand A1 with the following changes:"));
        assert!(prompt.contains("status: \"active\""));
        assert!(prompt.contains("capacity: 5"));
        assert!(!prompt.contains("id: \"A1\""));
    }

    #[test]
    fn unknown_operation_falls_back_to_json() {
        let params = object(json!({"name": "X"}));
        let prompt = message(OperationKind::Update, "terminal", &params, None);
        assert!(prompt.starts_with("Confirm update terminal with parameters:"));
    }
}
