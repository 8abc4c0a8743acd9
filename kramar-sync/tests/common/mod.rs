#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use kramar_storage::{Collection, MemoryStore, StoreExt};
use kramar_sync::transport::mock::{MockCentral, MockLink};
use kramar_sync::{BleCentral, DeviceHandle, HuggingConfig, HuggingSession, PlatformCapabilities};
use kramar_types::{
    DailyCheckIn, FoodList, HealthPlan, RecipeBook, RecordSource, Recipe, UserProfile,
};
use std::sync::Arc;

pub const NATIVE: PlatformCapabilities = PlatformCapabilities {
    native_bluetooth: true,
    touch_input: false,
};

pub const TOUCH_ONLY: PlatformCapabilities = PlatformCapabilities {
    native_bluetooth: false,
    touch_input: true,
};

pub fn device(id: &str, name: &str) -> DeviceHandle {
    DeviceHandle::new(id, Some(name.to_string()))
}

pub fn config(name: &str) -> HuggingConfig {
    HuggingConfig {
        device_name: name.to_string(),
        ..Default::default()
    }
}

pub fn native_session(central: Arc<MockCentral>, name: &str) -> HuggingSession {
    HuggingSession::new(NATIVE, Some(central as Arc<dyn BleCentral>), config(name))
}

/// Two sessions wired to the two ends of one mock link.
pub fn linked_sessions(a_name: &str, b_name: &str, max_write_len: usize) -> (HuggingSession, HuggingSession) {
    let a_dev = device("dev-a", a_name);
    let b_dev = device("dev-b", b_name);
    let (a_end, b_end) = MockLink::pair(a_dev.clone(), b_dev.clone(), max_write_len);
    let a_central = Arc::new(MockCentral::with_link(b_dev, a_end));
    let b_central = Arc::new(MockCentral::with_link(a_dev, b_end));
    (native_session(a_central, a_name), native_session(b_central, b_name))
}

pub fn profile(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        name: name.into(),
        current_weight: 82.0,
        target_weight: 76.0,
        height: 178.0,
        age: 38,
        goals: vec!["Gå ner i vikt".into()],
        lifestyle: vec![],
        has_seen_tutorial: Some(true),
    }
}

pub fn plan(user_id: &str, text: &str, days_ago: i64) -> HealthPlan {
    let mut plan = HealthPlan::new(user_id, text);
    let at = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap() - Duration::days(days_ago);
    plan.created_at = at;
    plan.updated_at = at;
    plan
}

pub fn food_list(user_id: &str) -> FoodList {
    FoodList {
        user_id: user_id.into(),
        yes: vec!["Lax".into(), "Broccoli".into()],
        no: vec!["Läsk".into()],
        sometimes: vec!["Choklad".into()],
    }
}

pub fn recipe_book(user_id: &str) -> RecipeBook {
    RecipeBook {
        user_id: user_id.into(),
        recipes: vec![Recipe {
            id: "r1".into(),
            user_id: user_id.into(),
            title: "Linsgryta".into(),
            description: String::new(),
            ingredients: vec!["Linser".into()],
            instructions: vec!["Koka".into()],
            cooking_time: "30 min".into(),
            servings: "4".into(),
            source: RecordSource::Manual,
            source_url: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }],
    }
}

pub fn check_in(user_id: &str, day: u32) -> DailyCheckIn {
    let date = Utc.with_ymd_and_hms(2026, 9, day, 20, 0, 0).unwrap();
    let mut c = DailyCheckIn::new(user_id, date, 7, 6).unwrap();
    c.id = format!("c{day:02}");
    c
}

/// A store holding a profile and a health plan for `user_id`.
pub async fn store_with_profile_and_plan(user_id: &str, name: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::initialized().await);
    store
        .store_record(Collection::UserProfiles, &profile(user_id, name))
        .await
        .unwrap();
    store
        .store_record(Collection::HealthPlans, &plan(user_id, "Promenad varje dag", 0))
        .await
        .unwrap();
    store
}
