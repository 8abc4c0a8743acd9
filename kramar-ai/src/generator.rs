//! The generation interface and its inputs and outputs.

use crate::error::AiResult;
use async_trait::async_trait;
use kramar_types::{
    Activity, ActivityCategory, DailyCheckIn, Difficulty, FoodList, Recipe, RecordSource,
    UserProfile,
};
use serde::{Deserialize, Serialize};

/// Shown when no motivational message could be generated.
pub const FALLBACK_MOTIVATION: &str = "Bra jobbat idag! Fortsätt så här! 💪";

/// Input for a health plan, optionally shared with a partner.
#[derive(Debug, Clone)]
pub struct HealthPlanInput {
    pub user: UserProfile,
    pub partner: Option<UserProfile>,
}

/// What a recipe should be based on.
#[derive(Debug, Clone)]
pub enum RecipeInput {
    /// A new recipe fitting the user's food lists.
    FromPreferences(FoodList),
    /// A recipe structured from a link.
    FromLink(String),
}

/// A generated recipe, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeData {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub cooking_time: String,
    #[serde(default = "default_servings")]
    pub servings: String,
}

impl RecipeData {
    /// Turns the generated recipe into a stored record for `user_id`.
    ///
    /// Link recipes keep their URL; preference recipes are marked as AI.
    pub fn into_recipe(self, user_id: &str, input: &RecipeInput) -> Recipe {
        let (source, source_url) = match input {
            RecipeInput::FromPreferences(_) => (RecordSource::Ai, None),
            RecipeInput::FromLink(url) => (RecordSource::Link, Some(url.clone())),
        };
        Recipe {
            description: self.description,
            ingredients: self.ingredients,
            instructions: self.instructions,
            cooking_time: self.cooking_time,
            servings: self.servings,
            source_url,
            ..Recipe::new(user_id, self.title, source)
        }
    }
}

fn default_servings() -> String {
    "2".to_string()
}

/// Input for activity suggestions.
#[derive(Debug, Clone)]
pub struct ActivityInput {
    pub user: UserProfile,
    /// Names of activities the user already has.
    pub existing: Vec<String>,
}

/// One suggested activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySuggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    pub difficulty: Difficulty,
    pub category: ActivityCategory,
}

impl ActivitySuggestion {
    /// Turns the suggestion into a stored AI activity for `user_id`.
    pub fn into_activity(self, user_id: &str) -> Activity {
        Activity {
            description: self.description,
            duration: self.duration,
            ..Activity::new(
                user_id,
                self.name,
                self.difficulty,
                self.category,
                RecordSource::Ai,
            )
        }
    }
}

/// The parts of a check-in a motivational message reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInSummary {
    pub mood: u8,
    pub energy: u8,
    pub notes: String,
}

impl From<&DailyCheckIn> for CheckInSummary {
    fn from(check_in: &DailyCheckIn) -> Self {
        Self {
            mood: check_in.mood,
            energy: check_in.energy,
            notes: check_in.notes.clone(),
        }
    }
}

/// Generates health artifacts from structured input.
#[async_trait]
pub trait HealthGenerator: Send + Sync {
    /// A personal health plan as text.
    async fn health_plan(&self, input: &HealthPlanInput) -> AiResult<String>;

    /// A structured recipe.
    async fn recipe(&self, input: &RecipeInput) -> AiResult<RecipeData>;

    /// A handful of new activities.
    async fn activity_suggestions(&self, input: &ActivityInput)
        -> AiResult<Vec<ActivitySuggestion>>;

    /// A short message reacting to today's check-in.
    async fn motivational_message(&self, input: &CheckInSummary) -> AiResult<String>;
}
