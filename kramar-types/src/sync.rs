//! Sync categories, selections and payloads.
//!
//! A selection is a set of flags over the six fixed categories. A payload
//! carries at most one entry per category; absent categories are simply
//! left out of the serialized form.

use crate::{Activity, DailyCheckIn, FoodList, HealthPlan, Recipe, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Number of most recent check-ins shared under [`Category::Progress`].
pub const PROGRESS_WINDOW: usize = 7;

/// A data category eligible for sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Profile,
    HealthPlan,
    FoodList,
    Recipes,
    Activities,
    Progress,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 6] = [
        Category::Profile,
        Category::HealthPlan,
        Category::FoodList,
        Category::Recipes,
        Category::Activities,
        Category::Progress,
    ];

    /// The wire name of the category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Profile => "profile",
            Category::HealthPlan => "healthPlan",
            Category::FoodList => "foodList",
            Category::Recipes => "recipes",
            Category::Activities => "activities",
            Category::Progress => "progress",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| crate::Error::UnknownCategory(wanted.to_string()))
    }
}

/// A set of selected categories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncSelection(BTreeSet<Category>);

impl SyncSelection {
    /// An empty selection.
    pub fn none() -> Self {
        Self::default()
    }

    /// A selection with every category set.
    pub fn all() -> Self {
        Category::ALL.into_iter().collect()
    }

    /// Whether `category` is selected.
    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    /// Sets a flag.
    pub fn insert(&mut self, category: Category) {
        self.0.insert(category);
    }

    /// Clears a flag.
    pub fn remove(&mut self, category: Category) {
        self.0.remove(&category);
    }

    /// Flips a flag and returns its new value.
    pub fn toggle(&mut self, category: Category) -> bool {
        if self.0.remove(&category) {
            false
        } else {
            self.0.insert(category);
            true
        }
    }

    /// Whether no flag is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of selected categories.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Categories set in both selections.
    pub fn intersection(&self, other: &SyncSelection) -> SyncSelection {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Iterates selected categories in display order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    /// Parses a comma-separated list such as `profile,foodList`.
    pub fn parse_list(input: &str) -> crate::Result<Self> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Category::from_str)
            .collect()
    }
}

impl FromIterator<Category> for SyncSelection {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SyncSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Category::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// The bundle of records exchanged for the selected categories.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_plan: Option<HealthPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_list: Option<FoodList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipes: Option<Vec<Recipe>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<Activity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Vec<DailyCheckIn>>,
}

impl SyncPayload {
    /// Whether the payload carries data for `category`.
    ///
    /// Empty lists count as absent.
    pub fn has(&self, category: Category) -> bool {
        match category {
            Category::Profile => self.profile.is_some(),
            Category::HealthPlan => self.health_plan.is_some(),
            Category::FoodList => self.food_list.as_ref().is_some_and(FoodList::has_entries),
            Category::Recipes => self.recipes.as_ref().is_some_and(|r| !r.is_empty()),
            Category::Activities => self.activities.as_ref().is_some_and(|a| !a.is_empty()),
            Category::Progress => self.progress.as_ref().is_some_and(|p| !p.is_empty()),
        }
    }

    /// Categories with data present.
    pub fn categories(&self) -> SyncSelection {
        Category::ALL.into_iter().filter(|c| self.has(*c)).collect()
    }

    /// Whether no category carries data.
    pub fn is_empty(&self) -> bool {
        self.categories().is_empty()
    }

    /// A copy restricted to `selection`; empty categories are dropped.
    pub fn filtered(&self, selection: &SyncSelection) -> SyncPayload {
        let keep = |c: Category| selection.contains(c) && self.has(c);
        SyncPayload {
            profile: self.profile.clone().filter(|_| keep(Category::Profile)),
            health_plan: self.health_plan.clone().filter(|_| keep(Category::HealthPlan)),
            food_list: self.food_list.clone().filter(|_| keep(Category::FoodList)),
            recipes: self.recipes.clone().filter(|_| keep(Category::Recipes)),
            activities: self.activities.clone().filter(|_| keep(Category::Activities)),
            progress: self.progress.clone().filter(|_| keep(Category::Progress)),
        }
    }
}
