use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{AutoTranslateError, Result};
use crate::locale::tree::join_path;

/// Parse a model reply into dotted path -> text.
///
/// Models wrap JSON in code fences or chatter often enough that the reply is
/// repaired before giving up: direct parse, fence stripping, then the span
/// from the first `{` to the last `}`. Nested objects are flattened to dotted
/// paths and non-string values are dropped.
pub fn parse_translation_map(raw: &str) -> Result<BTreeMap<String, String>> {
    let object = parse_object(raw).ok_or_else(|| {
        AutoTranslateError::MalformedResponse(truncate(raw.trim(), 200))
    })?;

    let mut out = BTreeMap::new();
    flatten_object(String::new(), &object, &mut out);
    Ok(out)
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let text = raw.trim();

    if let Some(object) = as_object(text) {
        return Some(object);
    }

    let cleaned = strip_code_fences(text);
    if cleaned != text {
        debug!("Removed markdown code fences from completion response");
        if let Some(object) = as_object(&cleaned) {
            return Some(object);
        }
    }

    for candidate in [text, cleaned.as_str()] {
        if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
            if start < end {
                debug!("Extracting JSON object from mixed response text");
                if let Some(object) = as_object(&candidate[start..=end]) {
                    return Some(object);
                }
            }
        }
    }

    None
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Remove ```json ... ```, ``` ... ``` and single-backtick wrappers
fn strip_code_fences(text: &str) -> String {
    let text = text.trim();

    for (open, close) in [("```json", "```"), ("```", "```"), ("`json", "`"), ("`", "`")] {
        if text.len() >= open.len() + close.len() && text.starts_with(open) && text.ends_with(close) {
            return text[open.len()..text.len() - close.len()].trim().to_string();
        }
    }

    text.to_string()
}

fn flatten_object(prefix: String, object: &Map<String, Value>, out: &mut BTreeMap<String, String>) {
    for (key, value) in object {
        let path = join_path(&prefix, key);
        match value {
            Value::String(text) => {
                out.insert(path, text.clone());
            }
            Value::Object(nested) => flatten_object(path, nested, out),
            _ => debug!("Ignoring non-string value for '{}'", path),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let map = parse_translation_map(r#"{"cart.empty_message": "Tu carrito está vacío"}"#).unwrap();
        assert_eq!(map["cart.empty_message"], "Tu carrito está vacío");
    }

    #[test]
    fn test_code_fenced_object() {
        let raw = "```json\n{\"a\": \"uno\", \"b\": \"dos\"}\n```";
        let map = parse_translation_map(raw).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], "dos");
    }

    #[test]
    fn test_object_inside_chatter() {
        let raw = "Sure! Here are the translations:\n{\"a\": \"un\"}\nLet me know if you need more.";
        let map = parse_translation_map(raw).unwrap();
        assert_eq!(map["a"], "un");
    }

    #[test]
    fn test_nested_reply_is_flattened() {
        let raw = r#"{"cart": {"empty_message": "Vide", "count": 3}}"#;
        let map = parse_translation_map(raw).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["cart.empty_message"], "Vide");
    }

    #[test]
    fn test_malformed_reply_is_rejected() {
        assert!(matches!(
            parse_translation_map("{\"a\": \"sem fim"),
            Err(AutoTranslateError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_translation_map("[\"not\", \"an object\"]"),
            Err(AutoTranslateError::MalformedResponse(_))
        ));
    }
}
