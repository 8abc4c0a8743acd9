use kramar_storage::{
    Collection, MemoryStore, PersistentStore, SqliteStore, StorageError, StoreExt,
};
use kramar_types::{FoodList, UserProfile};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::str::FromStr;

fn profile(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        name: name.into(),
        current_weight: 80.0,
        target_weight: 75.0,
        height: 180.0,
        age: 40,
        goals: vec![],
        lifestyle: vec![],
        has_seen_tutorial: Some(true),
    }
}

/// Runs the same behavioural checks against any store implementation.
async fn exercise_store(store: &dyn PersistentStore) {
    store.init().await.unwrap();
    store.init().await.unwrap(); // idempotent

    // Upsert by `id`.
    store.store_record(Collection::UserProfiles, &profile("u1", "Anna")).await.unwrap();
    store.store_record(Collection::UserProfiles, &profile("u1", "Anna B")).await.unwrap();
    store.store_record(Collection::UserProfiles, &profile("u0", "Erik")).await.unwrap();

    let all: Vec<UserProfile> = store.get_all_records(Collection::UserProfiles).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, "u0"); // key order
    assert_eq!(all[1].name, "Anna B");

    // Upsert by `userId`.
    let list = FoodList {
        user_id: "u1".into(),
        yes: vec!["Broccoli".into()],
        ..Default::default()
    };
    store.store_record(Collection::FoodLists, &list).await.unwrap();
    let fetched: Option<FoodList> = store.get_record(Collection::FoodLists, "u1").await.unwrap();
    assert_eq!(fetched, Some(list));

    // Collections are isolated.
    assert!(store.get(Collection::PartnerProfiles, "u1").await.unwrap().is_none());

    // Delete, including a missing key.
    store.delete(Collection::UserProfiles, "u1").await.unwrap();
    store.delete(Collection::UserProfiles, "missing").await.unwrap();
    assert!(store.get(Collection::UserProfiles, "u1").await.unwrap().is_none());
    assert_eq!(store.get_all(Collection::UserProfiles).await.unwrap().len(), 1);
}

// ── Collection ──────────────────────────────────────────────────

#[test]
fn collection_names_roundtrip() {
    for c in Collection::ALL {
        assert_eq!(Collection::from_str(c.as_str()).unwrap(), c);
    }
    assert!(matches!(
        Collection::from_str("nope"),
        Err(StorageError::UnknownCollection(_))
    ));
}

#[test]
fn collection_key_fields() {
    assert_eq!(Collection::UserProfiles.key_field(), "id");
    assert_eq!(Collection::HealthPlans.key_field(), "id");
    assert_eq!(Collection::FoodLists.key_field(), "userId");
    assert_eq!(Collection::PartnerCheckIns.key_field(), "userId");
    assert_eq!(Collection::DailyCheckIns.key_field(), "id");
}

#[test]
fn partner_collections_are_flagged() {
    let partner: Vec<Collection> = Collection::ALL.into_iter().filter(|c| c.is_partner()).collect();
    assert_eq!(partner.len(), 6);
    assert!(!Collection::UserProfiles.is_partner());
    assert!(!Collection::FoodLists.is_partner());
    assert!(Collection::PartnerFoodLists.is_partner());
}

#[test]
fn key_of_rejects_missing_or_empty_key() {
    assert_eq!(Collection::UserProfiles.key_of(&json!({"id": "a"})).unwrap(), "a");
    assert!(Collection::UserProfiles.key_of(&json!({"id": ""})).is_err());
    assert!(Collection::FoodLists.key_of(&json!({"id": "a"})).is_err());
    assert!(Collection::UserProfiles.key_of(&json!({"id": 4})).is_err());
}

// ── MemoryStore ─────────────────────────────────────────────────

#[tokio::test]
async fn memory_store_behaviour() {
    let store = MemoryStore::new();
    exercise_store(&store).await;
}

#[tokio::test]
async fn memory_store_requires_init() {
    let store = MemoryStore::new();
    let err = store
        .store(Collection::UserProfiles, json!({"id": "u1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotInitialized));
    assert!(store.get_all(Collection::UserProfiles).await.is_err());
}

#[tokio::test]
async fn memory_store_logs_writes() {
    let store = MemoryStore::initialized().await;
    store.store(Collection::PartnerProfiles, json!({"id": "partner-a"})).await.unwrap();
    store.store(Collection::PartnerProfiles, json!({"id": "partner-a"})).await.unwrap();
    store.store(Collection::FoodLists, json!({"userId": "u1"})).await.unwrap();

    assert_eq!(store.writes_to(Collection::PartnerProfiles), 2);
    assert_eq!(store.writes_to(Collection::UserProfiles), 0);
    assert_eq!(
        store.write_log().last(),
        Some(&(Collection::FoodLists, "u1".to_string()))
    );
}

#[tokio::test]
async fn memory_store_rejects_record_without_key() {
    let store = MemoryStore::initialized().await;
    let err = store
        .store(Collection::FoodLists, json!({"yes": []}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingKey { field: "userId", .. }));
    assert!(store.write_log().is_empty());
}

// ── SqliteStore ─────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_store_behaviour() {
    let store = SqliteStore::open_in_memory().unwrap();
    exercise_store(&store).await;
}

#[tokio::test]
async fn sqlite_store_requires_init() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(
        store.get(Collection::UserProfiles, "u1").await,
        Err(StorageError::NotInitialized)
    ));
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kramar.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.init().await.unwrap();
        store.store_record(Collection::UserProfiles, &profile("u1", "Anna")).await.unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    store.init().await.unwrap();
    let fetched: Option<UserProfile> = store.get_record(Collection::UserProfiles, "u1").await.unwrap();
    assert_eq!(fetched.map(|p| p.name), Some("Anna".to_string()));
}
