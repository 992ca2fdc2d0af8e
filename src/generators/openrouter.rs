use super::{GenerationRequest, TextStream, TripGenerator};
use crate::{
    error::{Result, TripError},
    services::openai_client::{ChatCompletionRequest, OpenAIClient},
};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// Streams the plan from an OpenAI-compatible endpoint (OpenRouter by default)
#[derive(Debug, Clone)]
pub struct OpenRouterGenerator {
    client: OpenAIClient,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenRouterGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: OpenAIClient::new(api_key.into())?,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.set_base_url(base_url);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Build from `OPENROUTER_API_KEY`/`OPENAI_API_KEY`, `OPENAI_BASE_URL`/
    /// `OPENROUTER_BASE_URL` and `MOOD_TRIP_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                TripError::Config(
                    "OPENROUTER_API_KEY or OPENAI_API_KEY must be set to generate trips"
                        .to_string(),
                )
            })?;

        let mut generator = Self::new(api_key)?;
        if let Ok(base_url) =
            std::env::var("OPENAI_BASE_URL").or_else(|_| std::env::var("OPENROUTER_BASE_URL"))
        {
            generator = generator.with_base_url(base_url);
        }
        if let Ok(model) = std::env::var("MOOD_TRIP_MODEL") {
            if !model.trim().is_empty() {
                generator = generator.with_model(model.trim());
            }
        }
        Ok(generator)
    }
}

#[async_trait]
impl TripGenerator for OpenRouterGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream> {
        let messages = vec![
            json!({ "role": "system", "content": request.system }),
            json!({ "role": "user", "content": request.brief }),
        ];
        let body = ChatCompletionRequest::new(&self.model, messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_response_format(request.schema.response_format())
            .into_value();

        info!(
            target: "moodtrip::http",
            model = %self.model,
            schema = request.schema.schema_name(),
            "requesting trip generation"
        );
        self.client.chat_completion_stream(&body).await
    }
}
