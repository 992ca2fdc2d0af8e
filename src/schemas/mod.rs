pub mod partial_json;
pub mod schema;
pub mod validation;

pub use partial_json::{extract_object, merge_monotonic, parse_partial};
pub use schema::{deserialize_structured, CompletionSchema, SchemaHandle};
pub use validation::SchemaValidator;
