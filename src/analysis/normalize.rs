//! Turns whatever the analysis service replied with into a [`NormalizedResult`].
//!
//! All probing of the reply's shape happens here, in a fixed order:
//!
//! 1. `message.content` string (or list of text parts)
//! 2. top-level `text` string
//! 3. the reply itself, if it is a string
//! 4. an `error` field, reported as [`Error::ServiceError`]
//! 5. a `message` field mentioning an error, reported as [`Error::ServiceError`]
//!
//! The extracted text has any markdown code fence removed and is then decoded
//! against the schema requested for the content kind. A reply that does not
//! match the schema degrades to [`PlainTextResult`] instead of failing.

use crate::ai::RawServiceResponse;
use crate::models::{
    ContentKind, NormalizedResult, PlainTextResult, StructuredImageResult, StructuredTextResult,
};
use crate::prompts::discriminant;
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::warn;

const ERROR_INDICATORS: &[&str] = &[
    "error",
    "failed",
    "failure",
    "exception",
    "denied",
    "unauthorized",
    "quota",
];

fn non_blank(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        // Some providers return content as a list of typed parts.
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect();
            let joined = text.join("");
            (!joined.trim().is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

fn mentions_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_INDICATORS.iter().any(|kw| lower.contains(kw))
}

/// Step 1: pull the reply text out of the raw response.
pub fn extract_text(raw: &RawServiceResponse) -> Result<String> {
    let value = raw.as_value();

    if let Some(text) = non_blank(value.pointer("/message/content")) {
        return Ok(text);
    }
    if let Some(text) = non_blank(value.get("text")) {
        return Ok(text);
    }
    if let Some(text) = value.as_str().filter(|s| !s.trim().is_empty()) {
        return Ok(text.to_string());
    }
    if let Some(message) = value.get("error").and_then(error_message) {
        return Err(Error::ServiceError(message));
    }
    if let Some(message) = value.get("message") {
        let text = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if mentions_error(&text) {
            return Err(Error::ServiceError(text));
        }
    }

    let blank_content = value
        .pointer("/message/content")
        .is_some_and(is_blank);
    if is_blank(value) || blank_content {
        return Err(Error::EmptyResponse);
    }

    Err(Error::ModelFailure(format!(
        "unexpected response shape: {}",
        value
    )))
}

/// Step 2: pull the body out of a markdown code fence such as ```` ```json ````.
///
/// The fence may sit anywhere in the reply; prose before or after it is
/// dropped. An opening fence without a closing one is left alone.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[open + 3..];
    let Some(close) = after.find("```") else {
        return trimmed;
    };
    let inner = &after[..close];

    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = match inner.find('\n') {
        Some(newline) if inner[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &inner[newline + 1..]
        }
        Some(_) => inner,
        None => inner
            .strip_prefix("json")
            .or_else(|| inner.strip_prefix("JSON"))
            .unwrap_or(inner),
    };
    body.trim()
}

fn degrade(cleaned: &str, reason: String) -> NormalizedResult {
    warn!(
        "{}; keeping the reply as plain text",
        Error::MalformedResponse(reason)
    );
    NormalizedResult::Plain(PlainTextResult {
        analysis_result: cleaned.to_string(),
    })
}

fn decode_object(
    kind: ContentKind,
    map: Map<String, Value>,
) -> std::result::Result<NormalizedResult, String> {
    let own = discriminant(kind);
    let other = match kind {
        ContentKind::Image => discriminant(ContentKind::Text),
        ContentKind::Text => discriminant(ContentKind::Image),
    };

    if !matches!(map.get(own), Some(Value::String(_))) {
        return Err(format!("reply has no string '{}' field", own));
    }
    if map.contains_key(other) {
        return Err(format!("reply carries both '{}' and '{}'", own, other));
    }

    let object = Value::Object(map);
    let result = match kind {
        ContentKind::Image => serde_json::from_value::<StructuredImageResult>(object)
            .map(NormalizedResult::Image),
        ContentKind::Text => serde_json::from_value::<StructuredTextResult>(object)
            .map(NormalizedResult::Text),
    };
    result.map_err(|e| format!("reply does not match the {} schema: {}", kind, e))
}

/// Step 3: decode the cleaned text against the schema for `kind`.
///
/// Never fails; anything that is not a complete structured reply comes back
/// as [`NormalizedResult::Plain`] holding `cleaned`.
pub fn decode(kind: ContentKind, cleaned: &str) -> NormalizedResult {
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => {
            decode_object(kind, map).unwrap_or_else(|reason| degrade(cleaned, reason))
        }
        Ok(_) => degrade(cleaned, "reply is not a JSON object".to_string()),
        Err(e) => degrade(cleaned, format!("reply is not valid JSON: {}", e)),
    }
}

/// Run all three steps.
pub fn normalize(kind: ContentKind, raw: &RawServiceResponse) -> Result<NormalizedResult> {
    let text = extract_text(raw)?;
    let cleaned = strip_code_fence(&text);
    if cleaned.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(decode(kind, cleaned))
}
