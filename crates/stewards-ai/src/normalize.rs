//! Turning raw model text into annotation records.

use serde_json::Value;
use stewards_core::AnnotationRecord;
use thiserror::Error;

/// Characters of raw output kept for diagnostics.
const PREVIEW_CHARS: usize = 300;

/// The model's answer could not be read as an incident object or array.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("malformed model output: {reason}")]
pub struct MalformedOutput {
    pub reason: String,
    /// Leading slice of the raw output.
    pub preview: String,
}

impl MalformedOutput {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// Remove a code fence wrapped around the whole answer.
///
/// Only a literal leading "```json" (or bare "```") and a trailing "```" are
/// recognised; fences anywhere else are left alone.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a model answer into records.
///
/// A single object becomes one record; an array of objects becomes one
/// record per element, in the model's order. Field values are not
/// type-checked.
pub fn normalize(raw: &str) -> Result<Vec<AnnotationRecord>, MalformedOutput> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(MalformedOutput::new("empty output", raw));
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| MalformedOutput::new(e.to_string(), raw))?;

    let items = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        other => {
            return Err(MalformedOutput::new(
                format!("expected an object or array, got {}", json_kind(&other)),
                raw,
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let kind = json_kind(&item);
            let mut record = AnnotationRecord::from_value(item).ok_or_else(|| {
                MalformedOutput::new(format!("array element {idx} is {kind}, not an object"), raw)
            })?;
            record.canonicalize_aliases();
            Ok(record)
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
