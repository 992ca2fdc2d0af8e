use crate::error::{Result, TripError};
use schemars::{schema::RootSchema, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{
    any::{type_name, TypeId},
    sync::Arc,
};

/// Cached JSON schema handle associated with a response type.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    schema_name: &'static str,
    type_name: &'static str,
    type_id: TypeId,
    schema_json: Arc<Value>,
}

impl SchemaHandle {
    /// Derive the schema of `T`; doc comments on fields become descriptions.
    pub fn for_type<T: JsonSchema + 'static>(schema_name: &'static str) -> Self {
        Self::from_root_schema::<T>(schema_name, schemars::schema_for!(T))
    }

    pub fn from_root_schema<T: 'static>(schema_name: &'static str, root: RootSchema) -> Self {
        let schema_json = serde_json::to_value(root).unwrap_or_else(|err| {
            panic!("failed to serialize schema for {}: {}", type_name::<T>(), err)
        });

        Self {
            schema_name,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            schema_json: Arc::new(schema_json),
        }
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn schema_json(&self) -> &Value {
        self.schema_json.as_ref()
    }

    /// OpenAI-compatible `response_format` block targeting this schema.
    pub fn response_format(&self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.schema_name,
                "strict": false,
                "schema": self.schema_json()
            }
        })
    }

    /// Top-level property names in schema order.
    pub fn property_names(&self) -> Vec<&str> {
        self.schema_json
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// A type that can be requested from the generator as a structured object.
pub trait CompletionSchema: DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static SchemaHandle;
}

/// Deserialize `payload` into `T`, reporting the JSON path of the first type error.
pub fn deserialize_structured<T>(payload: &Value) -> Result<T>
where
    T: CompletionSchema,
{
    let schema = T::schema();
    if schema.type_id() != TypeId::of::<T>() {
        return Err(TripError::Config(format!(
            "schema `{}` does not match target type `{}`",
            schema.schema_name(),
            type_name::<T>(),
        )));
    }

    serde_path_to_error::deserialize(payload).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        TripError::SchemaViolation {
            message: format!(
                "failed to deserialize `{}` at {}: {}",
                schema.schema_name(),
                location,
                err.inner()
            ),
            violations: Vec::new(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::trip_types::TripPlan;

    #[test]
    fn test_response_format_embeds_schema() {
        let handle = TripPlan::schema();
        let format = handle.response_format();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "trip_plan");
        assert!(format["json_schema"]["schema"]["properties"].is_object());
    }

    #[test]
    fn test_deserialize_reports_path() {
        let payload = json!({ "id": "x", "title": 42 });
        let err = deserialize_structured::<TripPlan>(&payload).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
        assert!(err.to_string().contains("title"), "{err}");
    }

    #[test]
    fn test_property_names_cover_plan() {
        let names = TripPlan::schema().property_names();
        assert!(names.contains(&"itinerary"));
        assert!(names.contains(&"transport"));
    }
}
