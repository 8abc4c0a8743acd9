//! Health records kept per user.
//!
//! Field names serialize in camelCase because stored documents are keyed by
//! `id` or `userId` depending on the collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest mood/energy score a check-in accepts.
pub const MIN_SCORE: u8 = 1;

/// Highest mood/energy score a check-in accepts.
pub const MAX_SCORE: u8 = 10;

/// A user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    /// Current weight in kg.
    pub current_weight: f64,
    /// Target weight in kg.
    pub target_weight: f64,
    /// Height in cm.
    pub height: f64,
    pub age: u32,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub lifestyle: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_seen_tutorial: Option<bool>,
}

impl UserProfile {
    /// Checks what profile setup insists on: a name, at least one goal and
    /// at least one lifestyle entry.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Required("name"));
        }
        if self.goals.iter().all(|g| g.trim().is_empty()) {
            return Err(crate::Error::Required("goals"));
        }
        if self.lifestyle.iter().all(|l| l.trim().is_empty()) {
            return Err(crate::Error::Required("lifestyle"));
        }
        Ok(())
    }

    /// Kilograms left to the target weight (negative when gaining).
    pub fn remaining_kg(&self) -> f64 {
        self.current_weight - self.target_weight
    }
}

/// A generated or hand-written health plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPlan {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default)]
    pub recipes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthPlan {
    /// Creates a plan for `user_id` stamped with the current time.
    pub fn new(user_id: impl Into<String>, plan: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            plan: plan.into(),
            exercises: Vec::new(),
            recipes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Foods sorted into yes / no / sometimes, one list per user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodList {
    pub user_id: String,
    #[serde(default)]
    pub yes: Vec<String>,
    #[serde(default)]
    pub no: Vec<String>,
    #[serde(default)]
    pub sometimes: Vec<String>,
}

impl FoodList {
    /// Whether any of the three lists has entries.
    pub fn has_entries(&self) -> bool {
        !(self.yes.is_empty() && self.no.is_empty() && self.sometimes.is_empty())
    }
}

/// Where a recipe or activity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Manual,
    Link,
    Ai,
}

/// A recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub cooking_time: String,
    #[serde(default)]
    pub servings: String,
    pub source: RecordSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// A recipe with only a title, stamped with a fresh id and the current time.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, source: RecordSource) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: String::new(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            cooking_time: String::new(),
            servings: String::new(),
            source,
            source_url: None,
            created_at: Utc::now(),
        }
    }
}

/// All recipes of one user, stored as a single document keyed by `userId`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeBook {
    pub user_id: String,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

/// How demanding an activity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "Lätt")]
    Easy,
    #[serde(rename = "Medel")]
    Medium,
    #[serde(rename = "Svår")]
    Hard,
}

impl Difficulty {
    /// The Swedish label, as stored.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Lätt",
            Difficulty::Medium => "Medel",
            Difficulty::Hard => "Svår",
        }
    }
}

/// Kind of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCategory {
    #[serde(rename = "Kondition")]
    Cardio,
    #[serde(rename = "Styrka")]
    Strength,
    #[serde(rename = "Flexibilitet")]
    Flexibility,
    #[serde(rename = "Balans")]
    Balance,
    #[serde(rename = "Mental hälsa")]
    MentalHealth,
    #[serde(rename = "Utomhus")]
    Outdoor,
    #[serde(rename = "Grupp")]
    Group,
}

/// A planned or suggested activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    pub difficulty: Difficulty,
    pub category: ActivityCategory,
    pub source: RecordSource,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// An activity stamped with a fresh id and the current time.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        difficulty: Difficulty,
        category: ActivityCategory,
        source: RecordSource,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            description: String::new(),
            duration: String::new(),
            difficulty,
            category,
            source,
            created_at: Utc::now(),
        }
    }
}

/// All activities of one user, stored as a single document keyed by `userId`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub user_id: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// A daily mood/energy check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCheckIn {
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    /// 1-10.
    pub mood: u8,
    /// 1-10.
    pub energy: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl DailyCheckIn {
    /// Creates a check-in, validating the mood and energy scores.
    pub fn new(
        user_id: impl Into<String>,
        date: DateTime<Utc>,
        mood: u8,
        energy: u8,
    ) -> crate::Result<Self> {
        check_score("mood", mood)?;
        check_score("energy", energy)?;
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            date,
            mood,
            energy,
            weight: None,
            notes: String::new(),
            activities: Vec::new(),
        })
    }
}

fn check_score(field: &'static str, value: u8) -> crate::Result<()> {
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(crate::Error::OutOfRange {
            field,
            min: MIN_SCORE,
            max: MAX_SCORE,
            value,
        })
    }
}

/// A partner's recent check-ins, stored as one document keyed by `userId`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInLog {
    pub user_id: String,
    #[serde(default)]
    pub check_ins: Vec<DailyCheckIn>,
}

/// The app version last seen on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    /// Always `"version"`.
    pub id: String,
    pub version: String,
    pub build_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_available: Option<bool>,
}
