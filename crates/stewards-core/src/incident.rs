//! Typed view over an annotation record.
//!
//! Records hold whatever the model produced, or the text the store read back.
//! This is the one place that interprets those values: every conversion is
//! lenient and an unparseable value becomes `None` (or an empty list) rather
//! than an error.

use serde_json::Value;

use crate::record::AnnotationRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Incident {
    pub year: Option<i32>,
    pub grand_prix: Option<String>,
    pub session_type: Option<String>,
    pub lap_number: Option<u32>,
    pub penalty_given: Option<String>,
    pub was_contact_made: Option<bool>,
    pub drivers_involved: Vec<String>,
    pub teams_involved: Vec<String>,
    pub source_document: Option<String>,
}

impl Incident {
    pub fn from_record(record: &AnnotationRecord) -> Self {
        Self {
            year: record
                .get("year")
                .and_then(as_integer)
                .and_then(|n| i32::try_from(n).ok()),
            grand_prix: record.get("grand_prix").and_then(as_text),
            session_type: record.get("session_type").and_then(as_text),
            lap_number: record
                .get("lap_number")
                .and_then(as_integer)
                .and_then(|n| u32::try_from(n).ok()),
            penalty_given: record
                .get("penalty_given")
                .and_then(as_text)
                .filter(|p| !is_no_penalty(p)),
            was_contact_made: record.get("was_contact_made").and_then(as_flag),
            drivers_involved: record.get("drivers_involved").map(as_list).unwrap_or_default(),
            teams_involved: record.get("teams_involved").map(as_list).unwrap_or_default(),
            source_document: record.source_document().map(str::to_string),
        }
    }

    pub fn has_penalty(&self) -> bool {
        self.penalty_given.is_some()
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First run of ASCII digits in the value: `"Lap 12"` is 12.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let start = s.find(|c: char| c.is_ascii_digit())?;
            let digits: String = s[start..].chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            if s == "true" || s == "yes" || s.starts_with("yes,") || s.starts_with("yes ") {
                Some(true)
            } else if s == "false" || s == "no" || s.starts_with("no,") || s.starts_with("no ") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A JSON array, a string holding a JSON array, or a comma-separated string.
fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('[')
                && let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed)
            {
                return items.iter().filter_map(as_text).collect();
            }
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        }
        other => as_text(other).into_iter().collect(),
    }
}

fn is_no_penalty(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "none" | "no" | "no penalty" | "no further action" | "n/a"
    )
}
