//! Core type definitions for Kramar.
//!
//! This crate defines the records a couple keeps about their health goals
//! and the vocabulary the proximity sync speaks:
//! - User identifiers and partner identities
//! - Profile, health plan, food list, recipe, activity and check-in records
//! - Sync categories, selections and payloads
//!
//! Storage, transport and negotiation live in their own crates.

mod ids;
mod partner;
mod records;
mod sync;

pub use ids::UserId;
pub use partner::{PartnerIdentity, FALLBACK_PARTNER_LABEL, PARTNER_ID_PREFIX};
pub use records::{
    Activity, ActivityCategory, ActivityLog, AppVersion, CheckInLog, DailyCheckIn, Difficulty,
    FoodList, HealthPlan, Recipe, RecipeBook, RecordSource, UserProfile, MAX_SCORE, MIN_SCORE,
};
pub use sync::{Category, SyncPayload, SyncSelection, PROGRESS_WINDOW};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown sync category: {0}")]
    UnknownCategory(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u8,
        max: u8,
        value: u8,
    },

    #[error("empty identifier")]
    EmptyId,

    #[error("{0} is required")]
    Required(&'static str),
}
