//! Helpers for pulling structured data out of model text.

use serde_json::Value;

/// Parse JSON from a model response.
///
/// Accepts a bare JSON document, a fenced ```json block, or the outermost
/// `{...}` span embedded in prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(after[..end].trim()) {
                return Some(value);
            }
        }
    }

    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    if close <= open {
        return None;
    }
    serde_json::from_str(&trimmed[open..=close]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_json() {
        assert_eq!(extract_json(r#" {"a": 1} "#), Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"sentiment\": \"positive\"}\n```\nThanks";
        assert_eq!(extract_json(text), Some(json!({ "sentiment": "positive" })));
    }

    #[test]
    fn test_embedded_object() {
        let text = "The answer is {\"category\": \"billing\"} as requested.";
        assert_eq!(extract_json(text), Some(json!({ "category": "billing" })));
    }

    #[test]
    fn test_garbage() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
