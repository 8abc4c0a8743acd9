//! Named collections and their declared key fields.

use crate::error::{StorageError, StorageResult};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A named collection in the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    UserProfiles,
    Partners,
    PartnerProfiles,
    HealthPlans,
    PartnerHealthPlans,
    FoodLists,
    PartnerFoodLists,
    Recipes,
    PartnerRecipes,
    Activities,
    PartnerActivities,
    DailyCheckIns,
    PartnerCheckIns,
    AppSettings,
}

impl Collection {
    /// Every collection the store knows about.
    pub const ALL: [Collection; 14] = [
        Collection::UserProfiles,
        Collection::Partners,
        Collection::PartnerProfiles,
        Collection::HealthPlans,
        Collection::PartnerHealthPlans,
        Collection::FoodLists,
        Collection::PartnerFoodLists,
        Collection::Recipes,
        Collection::PartnerRecipes,
        Collection::Activities,
        Collection::PartnerActivities,
        Collection::DailyCheckIns,
        Collection::PartnerCheckIns,
        Collection::AppSettings,
    ];

    /// The collection's storage name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::UserProfiles => "userProfiles",
            Collection::Partners => "partners",
            Collection::PartnerProfiles => "partnerProfiles",
            Collection::HealthPlans => "healthPlans",
            Collection::PartnerHealthPlans => "partnerHealthPlans",
            Collection::FoodLists => "foodLists",
            Collection::PartnerFoodLists => "partnerFoodLists",
            Collection::Recipes => "recipes",
            Collection::PartnerRecipes => "partnerRecipes",
            Collection::Activities => "activities",
            Collection::PartnerActivities => "partnerActivities",
            Collection::DailyCheckIns => "dailyCheckIns",
            Collection::PartnerCheckIns => "partnerCheckIns",
            Collection::AppSettings => "appSettings",
        }
    }

    /// The field records are upserted by.
    pub const fn key_field(&self) -> &'static str {
        match self {
            Collection::FoodLists
            | Collection::PartnerFoodLists
            | Collection::Recipes
            | Collection::PartnerRecipes
            | Collection::Activities
            | Collection::PartnerActivities
            | Collection::PartnerCheckIns => "userId",
            _ => "id",
        }
    }

    /// Whether the collection holds records received from a partner.
    pub const fn is_partner(&self) -> bool {
        matches!(
            self,
            Collection::PartnerProfiles
                | Collection::PartnerHealthPlans
                | Collection::PartnerFoodLists
                | Collection::PartnerRecipes
                | Collection::PartnerActivities
                | Collection::PartnerCheckIns
        )
    }

    /// Extracts the record's key according to [`Collection::key_field`].
    pub fn key_of(&self, record: &Value) -> StorageResult<String> {
        record
            .get(self.key_field())
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or(StorageError::MissingKey {
                collection: *self,
                field: self.key_field(),
            })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StorageError::UnknownCollection(s.to_string()))
    }
}
