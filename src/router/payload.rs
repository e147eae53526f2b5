//! Defensive parsing of the translation service's free-text reply.
//!
//! The reply nominally is a JSON object, sometimes wrapped in a markdown code
//! fence. Anything unparseable collapses into the empty payload, which is
//! never eligible.

use serde_json::Value;

/// Fields extracted from a translation reply. Unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTranslation {
    pub detected_language: Option<String>,
    pub target_language: Option<String>,
    pub translated_text: Option<String>,
    pub should_reply: bool,
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` fence and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = strip_prefix_ignore_case(text, "```json") {
        text = rest.trim_start();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    text.trim()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Parses a reply into a [`RawTranslation`], never failing.
pub fn parse_translation_payload(raw: &str) -> RawTranslation {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return RawTranslation::default();
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return RawTranslation::default(),
    };

    let Some(object) = value.as_object() else {
        return RawTranslation::default();
    };

    let string_field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    RawTranslation {
        detected_language: string_field("detected_language"),
        target_language: string_field("target_language"),
        translated_text: string_field("translated_text"),
        should_reply: object
            .get("should_reply")
            .map(is_truthy)
            .unwrap_or(false),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}
