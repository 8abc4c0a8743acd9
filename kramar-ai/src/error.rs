//! Error types for AI generation.

use std::fmt;
use thiserror::Error;

/// Result type for generation calls.
pub type AiResult<T> = Result<T, AiError>;

/// The artifact a generation call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    HealthPlan,
    Recipe,
    ActivitySuggestions,
    MotivationalMessage,
}

impl Artifact {
    /// Swedish noun used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            Artifact::HealthPlan => "hälsoplan",
            Artifact::Recipe => "recept",
            Artifact::ActivitySuggestions => "aktivitetsförslag",
            Artifact::MotivationalMessage => "motiverande meddelande",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors from the generation API.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key configured.
    #[error("no API key configured (set CLAUDE_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,

    /// A provider name nobody implements.
    #[error("unknown AI provider: {0}")]
    UnknownProvider(String),

    /// The API rejected the key.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request never got a response.
    #[error("network error: {0}")]
    Http(String),

    /// The API answered with an error status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response did not contain what was asked for.
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl AiError {
    /// Whether the failure is about credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, AiError::MissingApiKey | AiError::Auth(_))
    }

    /// The message shown to the user when generating `artifact` failed.
    pub fn user_message(&self, artifact: Artifact) -> String {
        if self.is_auth() {
            format!(
                "Kunde inte generera {artifact}. Kontrollera din API-nyckel och försök igen."
            )
        } else {
            format!("Kunde inte generera {artifact}. Försök igen senare.")
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AiError::Parse(err.to_string())
        } else {
            AiError::Http(err.to_string())
        }
    }
}
