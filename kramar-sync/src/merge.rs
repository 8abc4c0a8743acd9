//! Persisting received data under partner-namespaced keys.
//!
//! Every record is re-keyed with the partner's identity and written through
//! [`PartnerCollection`], which can only name partner collections, so a
//! received record can never land in the local user's own data.

use crate::error::SyncResult;
use kramar_storage::{Collection, PersistentStore, StoreExt};
use kramar_types::{
    ActivityLog, Category, CheckInLog, FoodList, HealthPlan, PartnerIdentity, RecipeBook,
    SyncPayload, UserProfile,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The partner collection each category is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartnerCollection {
    Profiles,
    HealthPlans,
    FoodLists,
    Recipes,
    Activities,
    CheckIns,
}

impl PartnerCollection {
    pub const ALL: [PartnerCollection; 6] = [
        PartnerCollection::Profiles,
        PartnerCollection::HealthPlans,
        PartnerCollection::FoodLists,
        PartnerCollection::Recipes,
        PartnerCollection::Activities,
        PartnerCollection::CheckIns,
    ];

    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Profile => PartnerCollection::Profiles,
            Category::HealthPlan => PartnerCollection::HealthPlans,
            Category::FoodList => PartnerCollection::FoodLists,
            Category::Recipes => PartnerCollection::Recipes,
            Category::Activities => PartnerCollection::Activities,
            Category::Progress => PartnerCollection::CheckIns,
        }
    }

    /// The storage collection. Always partner-namespaced.
    pub fn collection(self) -> Collection {
        match self {
            PartnerCollection::Profiles => Collection::PartnerProfiles,
            PartnerCollection::HealthPlans => Collection::PartnerHealthPlans,
            PartnerCollection::FoodLists => Collection::PartnerFoodLists,
            PartnerCollection::Recipes => Collection::PartnerRecipes,
            PartnerCollection::Activities => Collection::PartnerActivities,
            PartnerCollection::CheckIns => Collection::PartnerCheckIns,
        }
    }
}

/// Outcome of a merge, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub written: Vec<Category>,
    pub failed: Vec<(Category, String)>,
}

impl MergeReport {
    /// Whether every category present was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes received payloads into partner collections.
#[derive(Clone)]
pub struct PartnerMerge {
    store: Arc<dyn PersistentStore>,
}

impl PartnerMerge {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Upserts every category present in `payload` under `partner`.
    ///
    /// All records are built before the first write. Writes are independent:
    /// a failing category is reported and the others stay written.
    pub async fn merge(
        &self,
        partner: &PartnerIdentity,
        payload: &SyncPayload,
    ) -> SyncResult<MergeReport> {
        let records = partner_records(partner, payload)?;
        let mut report = MergeReport::default();

        for (category, record) in records {
            let target = PartnerCollection::for_category(category).collection();
            match self.store.store(target, record).await {
                Ok(()) => {
                    debug!(partner = partner.id(), %category, collection = %target, "stored partner record");
                    report.written.push(category);
                }
                Err(e) => {
                    warn!(partner = partner.id(), %category, error = %e, "failed to store partner record");
                    report.failed.push((category, e.to_string()));
                }
            }
        }

        info!(
            partner = partner.id(),
            written = report.written.len(),
            failed = report.failed.len(),
            "merged partner data"
        );
        Ok(report)
    }

    /// Reads back everything stored for `partner_id`.
    pub async fn stored(&self, partner_id: &str) -> SyncResult<SyncPayload> {
        let store = self.store.as_ref();

        let profile: Option<UserProfile> = store
            .get_record(Collection::PartnerProfiles, partner_id)
            .await?;
        let plans: Vec<HealthPlan> = store
            .get_all_records(Collection::PartnerHealthPlans)
            .await?;
        let food_list: Option<FoodList> = store
            .get_record(Collection::PartnerFoodLists, partner_id)
            .await?;
        let recipes: Option<RecipeBook> = store
            .get_record(Collection::PartnerRecipes, partner_id)
            .await?;
        let activities: Option<ActivityLog> = store
            .get_record(Collection::PartnerActivities, partner_id)
            .await?;
        let progress: Option<CheckInLog> = store
            .get_record(Collection::PartnerCheckIns, partner_id)
            .await?;

        Ok(SyncPayload {
            profile,
            health_plan: plans.into_iter().find(|p| p.user_id == partner_id),
            food_list,
            recipes: recipes.map(|b| b.recipes),
            activities: activities.map(|l| l.activities),
            progress: progress.map(|l| l.check_ins),
        })
    }

    /// Ids of every partner with at least one stored record.
    pub async fn list_partners(&self) -> SyncResult<Vec<String>> {
        let mut ids = BTreeSet::new();
        for target in PartnerCollection::ALL {
            let collection = target.collection();
            for record in self.store.get_all(collection).await? {
                let owner = match target {
                    PartnerCollection::Profiles => record.get("id"),
                    _ => record.get("userId"),
                };
                if let Some(id) = owner.and_then(Value::as_str) {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids.into_iter().collect())
    }
}

/// Re-keys each present category under `partner`.
fn partner_records(
    partner: &PartnerIdentity,
    payload: &SyncPayload,
) -> SyncResult<Vec<(Category, Value)>> {
    let owner = partner.id().to_string();
    let mut records = Vec::new();

    for category in payload.categories().iter() {
        let value = match category {
            Category::Profile => {
                let Some(profile) = &payload.profile else { continue };
                let mut profile = profile.clone();
                profile.id = owner.clone();
                serde_json::to_value(profile)?
            }
            Category::HealthPlan => {
                let Some(plan) = &payload.health_plan else { continue };
                let mut plan = plan.clone();
                plan.id = partner.health_plan_id();
                plan.user_id = owner.clone();
                serde_json::to_value(plan)?
            }
            Category::FoodList => {
                let Some(list) = &payload.food_list else { continue };
                let mut list = list.clone();
                list.user_id = owner.clone();
                serde_json::to_value(list)?
            }
            Category::Recipes => {
                let Some(recipes) = &payload.recipes else { continue };
                let mut recipes = recipes.clone();
                for recipe in &mut recipes {
                    recipe.user_id = owner.clone();
                }
                serde_json::to_value(RecipeBook {
                    user_id: owner.clone(),
                    recipes,
                })?
            }
            Category::Activities => {
                let Some(activities) = &payload.activities else { continue };
                let mut activities = activities.clone();
                for activity in &mut activities {
                    activity.user_id = owner.clone();
                }
                serde_json::to_value(ActivityLog {
                    user_id: owner.clone(),
                    activities,
                })?
            }
            Category::Progress => {
                let Some(check_ins) = &payload.progress else { continue };
                let mut check_ins = check_ins.clone();
                for check_in in &mut check_ins {
                    check_in.id = partner.check_in_id(&check_in.id);
                    check_in.user_id = owner.clone();
                }
                serde_json::to_value(CheckInLog {
                    user_id: owner.clone(),
                    check_ins,
                })?
            }
        };
        records.push((category, value));
    }

    Ok(records)
}
