//! Schema validation (§3 "schema (optional): a JSON-schema-like validator
//! consulted on insert/update"): a minimal required-fields-plus-value-kind
//! check, not a full JSON Schema implementation.
//!
//! New relative to the teacher (it has no document validator); grounded on
//! the shape `value::Value` already fixes — field kinds are checked against
//! the same variant set §3 defines rather than introducing a separate type
//! vocabulary.

use crate::errors::{DbError, DbResult};
use crate::value::{Document, Value, get_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    /// Either `Int` or `Float` (JSON schema's `"number"`).
    Number,
    Str,
    Array,
    Document,
}

impl ValueKind {
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (ValueKind::Null, Value::Null)
            | (ValueKind::Bool, Value::Bool(_))
            | (ValueKind::Int, Value::Int(_))
            | (ValueKind::Float, Value::Float(_))
            | (ValueKind::Str, Value::Str(_))
            | (ValueKind::Array, Value::Array(_))
            | (ValueKind::Document, Value::Document(_)) => true,
            (ValueKind::Number, Value::Int(_) | Value::Float(_)) => true,
            _ => false,
        }
    }
}

/// A document validator: a set of required dot-paths and an optional
/// expected kind for each. Fields not named here are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub required: Vec<String>,
    pub field_kinds: Vec<(String, ValueKind)>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require(mut self, path: impl Into<String>) -> Self {
        self.required.push(path.into());
        self
    }

    #[must_use]
    pub fn field(mut self, path: impl Into<String>, kind: ValueKind) -> Self {
        self.field_kinds.push((path.into(), kind));
        self
    }

    /// # Errors
    /// Returns `SchemaViolation` naming the first missing required field or
    /// first kind mismatch found.
    pub fn validate(&self, doc: &Document) -> DbResult<()> {
        for path in &self.required {
            if get_path(doc, path).is_none() {
                return Err(DbError::SchemaViolation(format!("missing required field '{path}'")));
            }
        }
        for (path, kind) in &self.field_kinds {
            if let Some(value) = get_path(doc, path) {
                if !kind.matches(value) {
                    return Err(DbError::SchemaViolation(format!("field '{path}' has the wrong type")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn required_field_missing_is_rejected() {
        let schema = Schema::new().require("email");
        let doc = doc! { "name".to_string() => Value::Str("a".into()) };
        assert!(matches!(schema.validate(&doc), Err(DbError::SchemaViolation(_))));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let schema = Schema::new().field("age", ValueKind::Int);
        let doc = doc! { "age".to_string() => Value::Str("old".into()) };
        assert!(matches!(schema.validate(&doc), Err(DbError::SchemaViolation(_))));
    }

    #[test]
    fn matching_document_passes() {
        let schema = Schema::new().require("email").field("age", ValueKind::Int);
        let doc = doc! { "email".to_string() => Value::Str("a@x.com".into()), "age".to_string() => Value::Int(30) };
        assert!(schema.validate(&doc).is_ok());
    }
}
