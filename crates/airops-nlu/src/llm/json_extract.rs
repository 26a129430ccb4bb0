//! Tolerant JSON extraction from LLM output.
//!
//! Models return the requested JSON wrapped in prose, code fences or
//! trailing commentary more often than not. `first_json_object` scans for
//! the first balanced `{ ... }` substring (string- and escape-aware) and
//! parses that; anything unparseable yields `None` and the caller falls
//! back to its rule-stage result.

use serde_json::Value;

/// Find and parse the first balanced JSON object in `text`.
pub fn first_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..=i];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        let v = first_json_object(r#"{"intent": "stand.details", "confidence": 0.9}"#).unwrap();
        assert_eq!(v["intent"], "stand.details");
    }

    #[test]
    fn object_wrapped_in_prose_and_fences() {
        let text = "Sure! Here is the result:\n```json\n{\"intent\": \"stand.details\", \"confidence\": 0.8}\n```\nLet me know if you need anything else.";
        let v = first_json_object(text).unwrap();
        assert_eq!(v["confidence"], 0.8);
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance() {
        let text = r#"{"note": "a } inside", "ok": true} trailing {"second": 1}"#;
        let v = first_json_object(text).unwrap();
        assert_eq!(v["ok"], true);
        assert!(v.get("second").is_none());
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let text = r#"{"msg": "he said \"hi\" {x}", "n": 2}"#;
        let v = first_json_object(text).unwrap();
        assert_eq!(v["n"], 2);
    }

    #[test]
    fn nested_objects_return_outermost() {
        let v = first_json_object(r#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(v["a"]["b"], 1);
    }

    #[test]
    fn no_object_returns_none() {
        assert!(first_json_object("no json here").is_none());
        assert!(first_json_object("").is_none());
    }

    #[test]
    fn unbalanced_object_returns_none() {
        assert!(first_json_object(r#"{"a": 1"#).is_none());
    }

    #[test]
    fn malformed_object_returns_none() {
        assert!(first_json_object("{not valid json}").is_none());
    }
}
