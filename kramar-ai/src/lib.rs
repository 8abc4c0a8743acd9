//! AI generation for Kramar.
//!
//! One call per artifact type: health plan text, recipe JSON, activity
//! suggestions and motivational messages. [`ClaudeClient`] implements
//! [`HealthGenerator`] over the Anthropic messages API, [`OpenAiClient`] over
//! OpenAI chat completions. [`generator_for`] picks one by [`Provider`].

mod client;
mod error;
mod generator;
mod openai;
mod prompt;

pub use client::{
    json_span, AiConfig, ClaudeClient, Provider, API_KEY_ENV, BASE_URL_ENV, MODEL_ENV,
    OPENAI_API_KEY_ENV,
};
pub use error::{AiError, AiResult, Artifact};
pub use generator::{
    ActivityInput, ActivitySuggestion, CheckInSummary, HealthGenerator, HealthPlanInput,
    RecipeData, RecipeInput, FALLBACK_MOTIVATION,
};
pub use openai::OpenAiClient;

/// Builds the generator for `provider`.
pub fn generator_for(provider: Provider, config: AiConfig) -> AiResult<Box<dyn HealthGenerator>> {
    Ok(match provider {
        Provider::Claude => Box::new(ClaudeClient::new(config)?),
        Provider::OpenAi => Box::new(OpenAiClient::new(config)?),
    })
}
