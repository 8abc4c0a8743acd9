//! OpenAI chat completions client.

use crate::client::{parse_json, rejected, AiConfig};
use crate::error::{AiError, AiResult};
use crate::generator::{
    ActivityInput, ActivitySuggestion, CheckInSummary, HealthGenerator, HealthPlanInput,
    RecipeData, RecipeInput,
};
use crate::prompt;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sampling settings for one artifact.
#[derive(Debug, Clone, Copy)]
struct Sampling {
    max_tokens: u32,
    temperature: f64,
}

const PLAN: Sampling = Sampling {
    max_tokens: 2000,
    temperature: 0.7,
};
const RECIPE: Sampling = Sampling {
    max_tokens: 1500,
    temperature: 0.8,
};
const ACTIVITIES: Sampling = Sampling {
    max_tokens: 1500,
    temperature: 0.8,
};
const MOTIVATION: Sampling = Sampling {
    max_tokens: 150,
    temperature: 0.8,
};

/// A [`HealthGenerator`] backed by the chat completions API.
pub struct OpenAiClient {
    config: AiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a client. Use [`AiConfig::for_provider`] for OpenAI defaults.
    pub fn new(config: AiConfig) -> AiResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Sends a system and a user message and returns the first choice.
    async fn chat(&self, system: &str, prompt: &str, sampling: Sampling) -> AiResult<String> {
        let api_key = self.config.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(model = %self.config.model, max_tokens = sampling.max_tokens, "sending chat request");

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model: &self.config.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt,
                    },
                ],
                max_tokens: sampling.max_tokens,
                temperature: sampling.temperature,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AiError::Parse("response has no content".into()))
    }
}

#[async_trait]
impl HealthGenerator for OpenAiClient {
    async fn health_plan(&self, input: &HealthPlanInput) -> AiResult<String> {
        self.chat(prompt::COACH_SYSTEM, &prompt::health_plan(input), PLAN)
            .await
    }

    async fn recipe(&self, input: &RecipeInput) -> AiResult<RecipeData> {
        let text = self
            .chat(prompt::CHEF_SYSTEM, &prompt::recipe(input), RECIPE)
            .await?;
        parse_json(&text, '{', '}')
    }

    async fn activity_suggestions(
        &self,
        input: &ActivityInput,
    ) -> AiResult<Vec<ActivitySuggestion>> {
        let text = self
            .chat(
                prompt::COACH_SYSTEM,
                &prompt::activity_suggestions(input),
                ACTIVITIES,
            )
            .await?;
        parse_json(&text, '[', ']')
    }

    async fn motivational_message(&self, input: &CheckInSummary) -> AiResult<String> {
        self.chat(
            prompt::ENCOURAGING_SYSTEM,
            &prompt::motivational_message(input),
            MOTIVATION,
        )
        .await
    }
}
