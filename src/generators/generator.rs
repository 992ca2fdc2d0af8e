use crate::{core::compiler::CompiledRequest, error::Result, schemas::SchemaHandle};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Raw text fragments of the generated object, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One structured-generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Instruction to answer with a single JSON object.
    pub system: String,
    /// Natural-language brief with the acceptance criteria.
    pub brief: String,
    /// Target shape of the object.
    pub schema: SchemaHandle,
}

impl GenerationRequest {
    pub fn new(compiled: &CompiledRequest, schema: &SchemaHandle) -> Self {
        Self {
            system: compiled.system.clone(),
            brief: compiled.brief.clone(),
            schema: schema.clone(),
        }
    }
}

/// A model that streams a JSON object as text.
///
/// Dropping the returned stream must release whatever the generator holds
/// open (the HTTP response body, a timer).
#[async_trait]
pub trait TripGenerator: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Start generating; fragments arrive on the returned stream
    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream>;
}
