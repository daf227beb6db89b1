use serde_json::Value;

use crate::error::{PlannerError, Result};

/// Pull the first JSON object out of free-form model output.
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or an object
/// embedded in surrounding prose.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let candidate = balanced_object(trimmed).ok_or_else(|| {
        PlannerError::Validation("model output contains no JSON object".to_string())
    })?;
    Ok(serde_json::from_str(candidate)?)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the opening fence.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// First `{ ... }` span whose braces balance, ignoring braces inside strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
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
    use serde_json::json;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_object() {
        let text = "```json\n{\"attractions\": []}\n```";
        assert_eq!(
            extract_json_object(text).unwrap(),
            json!({"attractions": []})
        );
    }

    #[test]
    fn test_object_inside_prose_with_braces_in_strings() {
        let text = r#"Sure! Here you go: {"name": "Cafe {Central}", "n": {"x": 2}} Enjoy."#;
        assert_eq!(
            extract_json_object(text).unwrap(),
            json!({"name": "Cafe {Central}", "n": {"x": 2}})
        );
    }

    #[test]
    fn test_missing_object_is_validation_error() {
        let err = extract_json_object("no json here").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
