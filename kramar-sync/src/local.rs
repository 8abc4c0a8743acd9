//! Reading the local user's data for an exchange.

use crate::error::SyncResult;
use kramar_storage::{Collection, PersistentStore, StoreExt};
use kramar_types::{
    ActivityLog, Category, DailyCheckIn, FoodList, HealthPlan, RecipeBook, SyncPayload,
    SyncSelection, UserId, UserProfile, PROGRESS_WINDOW,
};
use tracing::debug;

/// Everything the local user could offer, with per-category availability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalData {
    payload: SyncPayload,
}

impl LocalData {
    /// Reads the user's records from the store.
    ///
    /// The health plan is the user's most recently updated one; progress is
    /// the last [`PROGRESS_WINDOW`] check-ins, oldest first.
    pub async fn load(store: &dyn PersistentStore, user_id: &UserId) -> SyncResult<Self> {
        let user = user_id.as_str();

        let profile: Option<UserProfile> = store.get_record(Collection::UserProfiles, user).await?;

        let plans: Vec<HealthPlan> = store.get_all_records(Collection::HealthPlans).await?;
        let health_plan = plans
            .into_iter()
            .filter(|p| p.user_id == user)
            .max_by_key(|p| p.updated_at);

        let food_list: Option<FoodList> = store.get_record(Collection::FoodLists, user).await?;

        let recipes: Option<RecipeBook> = store.get_record(Collection::Recipes, user).await?;
        let activities: Option<ActivityLog> = store.get_record(Collection::Activities, user).await?;

        let check_ins: Vec<DailyCheckIn> = store.get_all_records(Collection::DailyCheckIns).await?;
        let mut progress: Vec<DailyCheckIn> =
            check_ins.into_iter().filter(|c| c.user_id == user).collect();
        progress.sort_by_key(|c| c.date);
        let skip = progress.len().saturating_sub(PROGRESS_WINDOW);
        let progress: Vec<DailyCheckIn> = progress.into_iter().skip(skip).collect();

        let payload = SyncPayload {
            profile,
            health_plan,
            food_list,
            recipes: recipes.map(|b| b.recipes),
            activities: activities.map(|l| l.activities),
            progress: Some(progress),
        };
        let local = Self {
            payload: payload.filtered(&SyncSelection::all()),
        };
        debug!(user = %user_id, available = %local.available(), "loaded local data");
        Ok(local)
    }

    /// Wraps an already built payload.
    pub fn from_payload(payload: SyncPayload) -> Self {
        Self {
            payload: payload.filtered(&SyncSelection::all()),
        }
    }

    /// Whether `category` has data to offer.
    pub fn has(&self, category: Category) -> bool {
        self.payload.has(category)
    }

    /// Categories with data.
    pub fn available(&self) -> SyncSelection {
        self.payload.categories()
    }

    /// The payload for `outgoing`.
    pub fn payload_for(&self, outgoing: &SyncSelection) -> SyncPayload {
        self.payload.filtered(outgoing)
    }
}
