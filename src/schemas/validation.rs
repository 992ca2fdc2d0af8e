use crate::{
    error::{Result, TripError},
    schemas::SchemaHandle,
    types::result::{CheckKind, Violation},
};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::fmt;

/// Compiled Draft 7 validator for one completion schema.
///
/// Unknown properties are accepted; wrong types and missing required fields
/// are reported with their instance paths.
pub struct SchemaValidator {
    schema_name: &'static str,
    compiled: JSONSchema,
}

impl SchemaValidator {
    pub fn new(schema: &SchemaHandle) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema.schema_json())
            .map_err(|err| {
                TripError::Config(format!(
                    "Failed to prepare `{}` schema for validation: {}",
                    schema.schema_name(),
                    err
                ))
            })?;

        Ok(Self {
            schema_name: schema.schema_name(),
            compiled,
        })
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    /// Every schema error in the payload, in validator order.
    pub fn violations(&self, payload: &Value) -> Vec<Violation> {
        match self.compiled.validate(payload) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let mut path = error.instance_path.to_string();
                    if path.is_empty() {
                        path = "<root>".to_string();
                    }
                    Violation::new(CheckKind::Schema, path, error.to_string())
                })
                .collect(),
        }
    }

    pub fn is_valid(&self, payload: &Value) -> bool {
        self.compiled.is_valid(payload)
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_name", &self.schema_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schemas::CompletionSchema, types::trip_types::TripPlan};
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::new(TripPlan::schema()).unwrap()
    }

    #[test]
    fn test_empty_object_reports_missing_fields() {
        let violations = validator().violations(&json!({}));
        assert!(!violations.is_empty());
        assert!(violations.iter().all(|v| v.kind == CheckKind::Schema));
        assert!(violations.iter().any(|v| v.message.contains("itinerary")));
    }

    #[test]
    fn test_string_where_number_expected_is_reported_with_path() {
        let payload = json!({
            "budget": { "currency": "$", "total": "3970", "breakdown": {} }
        });
        let violations = validator().violations(&payload);
        assert!(violations.iter().any(|v| v.path == "/budget/total"));
    }

    #[test]
    fn test_non_object_root() {
        let violations = validator().violations(&json!([1, 2]));
        assert_eq!(violations[0].path, "<root>");
    }
}
