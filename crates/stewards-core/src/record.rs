//! Documents and the annotation records extracted from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::incidents::{FIELD_ALIASES, SOURCE_DOCUMENT};

/// One raw text input, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One incident as emitted by the model.
///
/// Kept as an untyped field map: the model may answer `"2023"` where `2023`
/// was asked for, or add keys nobody asked for. The store decides which keys
/// become columns; [`crate::Incident`] is the typed view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationRecord {
    fields: Map<String, Value>,
}

impl AnnotationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object. Returns `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render a field as store text. Missing and `null` fields are `None`.
    pub fn cell(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(cell_text)
    }

    /// Tag the record with its originating document, replacing any
    /// model-supplied value.
    pub fn tag_source(&mut self, document_id: &str) {
        self.insert(SOURCE_DOCUMENT, document_id);
    }

    pub fn source_document(&self) -> Option<&str> {
        self.fields.get(SOURCE_DOCUMENT).and_then(Value::as_str)
    }

    /// Move alias keys onto their schema names.
    ///
    /// An alias only wins when the canonical field is absent or null.
    pub fn canonicalize_aliases(&mut self) {
        for (alias, canonical) in FIELD_ALIASES {
            let Some(value) = self.fields.remove(*alias) else {
                continue;
            };
            let canonical_empty = self.fields.get(*canonical).is_none_or(Value::is_null);
            if canonical_empty {
                self.fields.insert((*canonical).to_string(), value);
            }
        }
    }
}

/// Render a JSON value as opaque store text.
///
/// Strings are written verbatim, numbers and booleans via their JSON form,
/// arrays and objects as compact JSON.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
