//! Anthropic messages API client.

use crate::error::{AiError, AiResult};
use crate::generator::{
    ActivityInput, ActivitySuggestion, CheckInSummary, HealthGenerator, HealthPlanInput,
    RecipeData, RecipeInput,
};
use crate::prompt;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";
/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "KRAMAR_AI_BASE_URL";
/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "KRAMAR_AI_MODEL";

const API_VERSION: &str = "2023-06-01";

/// Which generation API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Anthropic messages API.
    #[default]
    Claude,
    /// OpenAI chat completions API.
    OpenAi,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Claude => API_KEY_ENV,
            Provider::OpenAi => OPENAI_API_KEY_ENV,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Claude => "https://api.anthropic.com",
            Provider::OpenAi => "https://api.openai.com",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-3-sonnet-20240229",
            Provider::OpenAi => "gpt-4",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAi),
            other => Err(AiError::UnknownProvider(other.to_string())),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    /// Base URL of the API (e.g. `https://api.anthropic.com`).
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::for_provider(Provider::Claude)
    }
}

impl AiConfig {
    /// Defaults for `provider`, without a key.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            api_key: None,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads Claude overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_for(Provider::Claude)
    }

    /// Reads overrides for `provider` from the process environment.
    pub fn from_env_for(provider: Provider) -> Self {
        Self::from_lookup_for(provider, |key| std::env::var(key).ok())
    }

    /// Reads Claude overrides through `lookup`. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::from_lookup_for(Provider::Claude, lookup)
    }

    /// Reads overrides for `provider` through `lookup`. Blank values are ignored.
    pub fn from_lookup_for(provider: Provider, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::for_provider(provider);
        Self {
            api_key: get(provider.api_key_env()),
            base_url: get(BASE_URL_ENV).unwrap_or(defaults.base_url),
            model: get(MODEL_ENV).unwrap_or(defaults.model),
            timeout: defaults.timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A [`HealthGenerator`] backed by the messages API.
pub struct ClaudeClient {
    config: AiConfig,
    client: Client,
}

impl ClaudeClient {
    /// Creates a client.
    pub fn new(config: AiConfig) -> AiResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Sends one user prompt and returns the first text block.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> AiResult<String> {
        let api_key = self.config.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        debug!(model = %self.config.model, max_tokens, "sending generation request");

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model: &self.config.model,
                max_tokens,
                messages: [Message {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AiError::Parse("response has no text".into()))
    }

    async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        max_tokens: u32,
        open: char,
        close: char,
    ) -> AiResult<T> {
        let text = self.complete(prompt, max_tokens).await?;
        parse_json(&text, open, close)
    }
}

/// Maps a non-success response to an error, keeping the API's message.
pub(crate) async fn rejected(response: Response) -> AiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    warn!(status = status.as_u16(), %message, "generation request rejected");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::Auth(message),
        _ => AiError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Parses the JSON between `open` and `close` in a text answer.
pub(crate) fn parse_json<T: DeserializeOwned>(text: &str, open: char, close: char) -> AiResult<T> {
    let span = json_span(text, open, close)
        .ok_or_else(|| AiError::Parse(format!("no JSON {open}...{close} in response")))?;
    serde_json::from_str(span).map_err(|e| AiError::Parse(e.to_string()))
}

/// The text from the first `open` to the last `close`.
pub fn json_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[async_trait]
impl HealthGenerator for ClaudeClient {
    async fn health_plan(&self, input: &HealthPlanInput) -> AiResult<String> {
        self.complete(&prompt::health_plan(input), 2000).await
    }

    async fn recipe(&self, input: &RecipeInput) -> AiResult<RecipeData> {
        self.complete_json(&prompt::recipe(input), 1000, '{', '}').await
    }

    async fn activity_suggestions(
        &self,
        input: &ActivityInput,
    ) -> AiResult<Vec<ActivitySuggestion>> {
        self.complete_json(&prompt::activity_suggestions(input), 1500, '[', ']')
            .await
    }

    async fn motivational_message(&self, input: &CheckInSummary) -> AiResult<String> {
        self.complete(&prompt::motivational_message(input), 150).await
    }
}
