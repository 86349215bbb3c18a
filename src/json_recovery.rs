//! Best-effort recovery of JSON values from generative model output.
//!
//! Model responses are nominally JSON but regularly arrive wrapped in a
//! markdown fence, surrounded by prose, or with one broken element inside an
//! otherwise valid array. [`parse_json_from_text`] walks an ordered chain of
//! fallbacks and returns `None` only once every stage has failed.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?\s*```$")
            .expect("fence pattern is valid")
    })
}

/// Removes a wrapping ```` ``` ```` / ```` ```json ```` fence, if the whole text is one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match fence_regex().captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) if !inner.as_str().is_empty() => inner.as_str().trim(),
        _ => trimmed,
    }
}

/// Finds the span of the first balanced `{...}` or `[...]` structure.
///
/// Returns the byte range `(start, end_inclusive)` and the opening delimiter.
/// Only the delimiter pair that opened the structure is counted, so a
/// `[` structure ignores braces and vice versa.
fn first_balanced_span(text: &str) -> Result<(usize, usize, u8), SpanError> {
    let bytes = text.as_bytes();
    let start = bytes
        .iter()
        .position(|&b| b == b'{' || b == b'[')
        .ok_or(SpanError::NoOpening)?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut balance: i64 = 0;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if b == open {
            balance += 1;
        } else if b == close {
            balance -= 1;
        }
        if balance == 0 {
            return Ok((start, start + offset, open));
        }
    }
    Err(SpanError::Unterminated)
}

#[derive(Debug, PartialEq, Eq)]
enum SpanError {
    NoOpening,
    Unterminated,
}

/// Parses every top-level `{...}` found between the outer brackets of `array_text`.
///
/// The depth counter is signed: a stray `}` leaves it negative and no
/// later object can start.
fn salvage_objects(array_text: &str) -> Vec<Value> {
    let bytes = array_text.as_bytes();
    let mut objects = Vec::new();
    if bytes.len() < 2 {
        return objects;
    }

    let mut depth: i64 = 0;
    let mut object_start: Option<usize> = None;

    for pos in 1..bytes.len() - 1 {
        match bytes[pos] {
            b'{' => {
                if depth == 0 {
                    object_start = Some(pos);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth != 0 {
                    continue;
                }
                if let Some(start) = object_start.take() {
                    let candidate = &array_text[start..=pos];
                    match serde_json::from_str::<Value>(candidate) {
                        Ok(value) => {
                            debug!(object = candidate, "recovered object from malformed array");
                            objects.push(value);
                        }
                        Err(e) => {
                            warn!(
                                object = candidate,
                                error = %e,
                                "dropping unparsable array element"
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

/// Recovers a JSON value from imperfect model output.
///
/// Stages, each tried only if the previous one failed:
/// 1. unwrap a surrounding code fence,
/// 2. parse the text directly,
/// 3. parse the first brace-balanced `{...}` / `[...]` span,
/// 4. for an array span, parse its top-level objects one by one and keep
///    the ones that parse.
///
/// Returns `None` when nothing usable could be recovered. Never panics.
pub fn parse_json_from_text(text: &str) -> Option<Value> {
    let processed = strip_code_fence(text);

    match serde_json::from_str::<Value>(processed) {
        Ok(value) => return Some(value),
        Err(e) => warn!(error = %e, "direct JSON parse failed, attempting extraction"),
    }

    let (start, end, open) = match first_balanced_span(processed) {
        Ok(span) => span,
        Err(SpanError::NoOpening) => {
            warn!("no opening '{{' or '[' found in model output");
            error!(text = processed, "all JSON recovery attempts failed");
            return None;
        }
        Err(SpanError::Unterminated) => {
            warn!("no balanced closing delimiter for the first opening one");
            error!(text = processed, "all JSON recovery attempts failed");
            return None;
        }
    };

    let extracted = &processed[start..=end];
    match serde_json::from_str::<Value>(extracted) {
        Ok(value) => return Some(value),
        Err(e) => warn!(span = extracted, error = %e, "parsing extracted structure failed"),
    }

    if open == b'[' {
        let objects = salvage_objects(extracted);
        if !objects.is_empty() {
            info!(recovered = objects.len(), "salvaged objects from malformed array");
            return Some(Value::Array(objects));
        }
        warn!("could not salvage any object from malformed array");
    }

    error!(text = processed, "all JSON recovery attempts failed");
    None
}

/// Runs [`parse_json_from_text`] and deserializes the recovered value into `T`.
pub fn parse_json_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = parse_json_from_text(text)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(error = %e, "recovered JSON does not have the expected shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_matches_inner_parse() {
        let inner = r#"[{"name": "Tomate", "quantity": "3 unidades"}]"#;
        let fenced = format!("```json\n{}\n```", inner);
        let direct: Value = serde_json::from_str(inner).unwrap();
        assert_eq!(parse_json_from_text(&fenced), Some(direct));
    }

    #[test]
    fn fence_without_language_tag() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(parse_json_from_text(fenced), Some(json!({"a": 1})));
    }

    #[test]
    fn plain_json_parses_directly() {
        let text = r#"{"title": "Gazpacho", "servings": 4, "tags": ["vegana"]}"#;
        let direct: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parse_json_from_text(text), Some(direct));
    }

    #[test]
    fn array_embedded_in_prose() {
        let text = r#"Here you go: [{"a":1},{"b":2}] hope that helps!"#;
        assert_eq!(parse_json_from_text(text), Some(json!([{"a": 1}, {"b": 2}])));
    }

    #[test]
    fn object_embedded_in_prose() {
        let text = "Sure! {\"a\": {\"b\": [1, 2]}} Anything else?";
        assert_eq!(parse_json_from_text(text), Some(json!({"a": {"b": [1, 2]}})));
    }

    #[test]
    fn malformed_element_is_dropped() {
        let text = r#"[{"a":1}, {b: }, {"a":3}]"#;
        assert_eq!(parse_json_from_text(text), Some(json!([{"a": 1}, {"a": 3}])));
    }

    #[test]
    fn stray_tokens_between_elements_are_salvaged() {
        let text = r#"[{"name": "Leche"} oops, {"name": "Pan", "extra": {"x": 1}}]"#;
        assert_eq!(
            parse_json_from_text(text),
            Some(json!([{"name": "Leche"}, {"name": "Pan", "extra": {"x": 1}}]))
        );
    }

    #[test]
    fn no_delimiters_fails() {
        assert_eq!(parse_json_from_text("no structured data here"), None);
        assert_eq!(parse_json_from_text(""), None);
    }

    #[test]
    fn unbalanced_object_fails() {
        assert_eq!(parse_json_from_text(r#"{"a": 1, "b": {"c": 2}"#), None);
    }

    #[test]
    fn unbalanced_array_fails() {
        assert_eq!(parse_json_from_text(r#"[{"a": 1}, {"a": 2}"#), None);
    }

    #[test]
    fn malformed_object_span_is_not_salvaged() {
        assert_eq!(parse_json_from_text("{a: 1}"), None);
    }

    #[test]
    fn array_with_no_recoverable_objects_fails() {
        assert_eq!(parse_json_from_text("[1, 2,, 3]"), None);
    }

    #[test]
    fn stray_closing_brace_stops_salvage() {
        let text = r#"[}, {"a": 1}, bad]"#;
        assert_eq!(parse_json_from_text(text), None);
    }

    #[test]
    fn stray_closing_brace_after_objects_keeps_earlier_ones() {
        let text = r#"[{"a": 1}, }, {"a": 2}, bad]"#;
        assert_eq!(parse_json_from_text(text), Some(json!([{"a": 1}])));
    }

    #[test]
    fn strip_code_fence_leaves_unfenced_text() {
        assert_eq!(strip_code_fence("  [1, 2]  "), "[1, 2]");
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
    }

    #[test]
    fn parse_json_as_rejects_wrong_shape() {
        let parsed: Option<Vec<String>> = parse_json_as(r#"["a", "b"]"#);
        assert_eq!(parsed, Some(vec!["a".to_string(), "b".to_string()]));
        let wrong: Option<Vec<String>> = parse_json_as(r#"{"a": 1}"#);
        assert_eq!(wrong, None);
    }
}
