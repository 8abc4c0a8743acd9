use chrono::Utc;
use clap::Parser;
use kramar_cli::{run, Cli, Command, GenerateCommand};
use kramar_storage::{Collection, PersistentStore, SqliteStore, StoreExt};
use kramar_types::{
    ActivityLog, DailyCheckIn, FoodList, HealthPlan, RecipeBook, RecordSource, SyncPayload,
    UserProfile,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profile(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        name: name.into(),
        current_weight: 80.0,
        target_weight: 75.0,
        height: 180.0,
        age: 40,
        goals: vec!["Må bättre".into()],
        lifestyle: vec![],
        has_seen_tutorial: None,
    }
}

async fn seeded_db(dir: &TempDir) -> std::path::PathBuf {
    let db = dir.path().join("kramar.db");
    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    store
        .store_record(Collection::UserProfiles, &profile("anna", "Anna"))
        .await
        .unwrap();
    store
        .store_record(Collection::HealthPlans, &HealthPlan::new("anna", "Promenera"))
        .await
        .unwrap();
    db
}

async fn exec(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::new();
    run(cli, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

fn db_arg(db: &Path) -> String {
    db.display().to_string()
}

// ── Parsing ─────────────────────────────────────────────────────

#[test]
fn hug_arguments_parse() {
    let cli = Cli::try_parse_from([
        "kramar",
        "--db",
        "x.db",
        "--device-name",
        "Anna",
        "hug",
        "--user",
        "anna",
        "--touch",
        "--send",
        "profile,healthPlan",
    ])
    .unwrap();
    assert_eq!(cli.device_name, "Anna");
    match cli.command {
        Command::Hug(args) => {
            assert!(args.touch);
            assert_eq!(args.send.as_deref(), Some("profile,healthPlan"));
            assert_eq!(args.receive, None);
            assert_eq!(args.fallback_delay_ms, 2000);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn generate_requires_a_user() {
    assert!(Cli::try_parse_from(["kramar", "generate", "plan"]).is_err());
    let cli = Cli::try_parse_from(["kramar", "generate", "motivation", "--user", "anna"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Generate {
            what: GenerateCommand::Motivation { .. }
        }
    ));
}

// ── Hugging mode ────────────────────────────────────────────────

#[tokio::test]
async fn touch_fallback_syncs_and_stores_partner_data() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;

    let partner = SyncPayload {
        profile: Some(profile("erik-local", "Erik")),
        food_list: Some(FoodList {
            user_id: "erik-local".into(),
            yes: vec!["Lax".into()],
            ..Default::default()
        }),
        ..Default::default()
    };
    let partner_file = dir.path().join("erik.json");
    std::fs::write(&partner_file, serde_json::to_string(&partner).unwrap()).unwrap();

    let output = exec(&[
        "kramar",
        "--db",
        &db_arg(&db),
        "--device-name",
        "Anna",
        "hug",
        "--user",
        "anna",
        "--touch",
        "--receive",
        "profile",
        "--partner-name",
        "Erik",
        "--partner-file",
        &partner_file.display().to_string(),
        "--fallback-delay-ms",
        "0",
    ])
    .await
    .unwrap();

    assert!(output.contains("Available to send: [profile, healthPlan]"));
    assert!(output.contains("Connected (simulated)"));
    assert!(output.contains("Partner: Erik (partner-erik)"));
    assert!(output.contains("Received: [profile]"));
    assert!(output.contains("Saved 1 categories"));

    let listed = exec(&["kramar", "--db", &db_arg(&db), "partners"])
        .await
        .unwrap();
    assert_eq!(listed, "partner-erik\tErik\t[profile]\n");

    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let own: Option<UserProfile> = store
        .get_record(Collection::UserProfiles, "anna")
        .await
        .unwrap();
    assert_eq!(own.unwrap().name, "Anna");
    assert!(store.get_all(Collection::PartnerFoodLists).await.unwrap().is_empty());
}

#[tokio::test]
async fn hug_without_touch_or_bluetooth_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let err = exec(&["kramar", "--db", &db_arg(&db), "hug", "--user", "anna"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not supported"));
}

#[tokio::test]
async fn sending_a_category_without_data_fails() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let err = exec(&[
        "kramar",
        "--db",
        &db_arg(&db),
        "hug",
        "--user",
        "anna",
        "--touch",
        "--send",
        "recipes",
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("recipes"));
}

#[tokio::test]
async fn partners_is_empty_on_a_fresh_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("fresh.db");
    let output = exec(&["kramar", "--db", &db_arg(&db), "partners"])
        .await
        .unwrap();
    assert_eq!(output, "No partner data stored\n");
}

// ── Version ─────────────────────────────────────────────────────

#[tokio::test]
async fn version_update_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let db = db_arg(&dir.path().join("v.db"));

    let first = exec(&["kramar", "--db", &db, "version", "--current", "1.0.0"])
        .await
        .unwrap();
    assert_eq!(first, "Up to date (1.0.0)\n");

    let updated = exec(&["kramar", "--db", &db, "version", "--current", "1.1.0"])
        .await
        .unwrap();
    assert_eq!(updated, "Updated from 1.0.0 to 1.1.0\n");

    let after = exec(&["kramar", "--db", &db, "version", "--current", "1.1.0"])
        .await
        .unwrap();
    assert_eq!(after, "Up to date (1.1.0)\n");
}

// ── Data entry ──────────────────────────────────────────────────

#[tokio::test]
async fn profile_set_stores_a_validated_profile() {
    let dir = TempDir::new().unwrap();
    let db = db_arg(&dir.path().join("p.db"));

    let output = exec(&[
        "kramar", "--db", &db, "profile", "set", "--user", "anna", "--name", " Anna ",
        "--weight", "72.5", "--target-weight", "68", "--height", "170", "--age", "34",
        "--goals", "Springa 5 km, Sova bättre", "--lifestyle", "Kontorsjobb,",
    ])
    .await
    .unwrap();
    assert_eq!(output, "Saved profile for Anna\n");

    let store = SqliteStore::open(Path::new(&db)).unwrap();
    store.init().await.unwrap();
    let stored: UserProfile = store
        .get_record(Collection::UserProfiles, "anna")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Anna");
    assert_eq!(stored.current_weight, 72.5);
    assert_eq!(stored.goals, vec!["Springa 5 km", "Sova bättre"]);
    assert_eq!(stored.lifestyle, vec!["Kontorsjobb"]);

    let shown = exec(&["kramar", "--db", &db, "profile", "show", "--user", "anna"])
        .await
        .unwrap();
    assert!(shown.contains("\"targetWeight\": 68.0"), "{shown}");
}

#[tokio::test]
async fn profile_without_goals_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = db_arg(&dir.path().join("p.db"));
    let err = exec(&[
        "kramar", "--db", &db, "profile", "set", "--user", "anna", "--name", "Anna",
        "--weight", "70", "--target-weight", "65", "--height", "168", "--age", "35",
        "--lifestyle", "Aktiv",
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("goals is required"), "{err}");
}

#[tokio::test]
async fn food_lists_replace_previous_lists() {
    let dir = TempDir::new().unwrap();
    let db = db_arg(&dir.path().join("f.db"));

    exec(&["kramar", "--db", &db, "food-list", "set", "--user", "anna", "--yes", "Lax"])
        .await
        .unwrap();
    let output = exec(&[
        "kramar", "--db", &db, "food-list", "set", "--user", "anna", "--yes", "Broccoli, Ägg",
        "--no", "Läsk", "--sometimes", " ",
    ])
    .await
    .unwrap();
    assert_eq!(output, "Saved food lists: 2 yes, 1 no, 0 sometimes\n");

    let shown = exec(&["kramar", "--db", &db, "food-list", "show", "--user", "anna"])
        .await
        .unwrap();
    assert_eq!(shown, "Yes: Broccoli, Ägg\nNo: Läsk\nSometimes: \n");
}

#[tokio::test]
async fn check_in_is_stored_and_feeds_motivation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(text_response("Härligt med en promenad!"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let output = exec(&[
        "kramar", "--db", &db_arg(&db), "check-in", "--user", "anna", "--mood", "8",
        "--energy", "6", "--weight", "79.5", "--notes", "Promenad i solen",
        "--activities", "Promenerade,Yoga",
    ])
    .await
    .unwrap();
    assert_eq!(output, "Check-in saved: mood 8/10, energy 6/10\n");

    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let check_ins: Vec<DailyCheckIn> =
        store.get_all_records(Collection::DailyCheckIns).await.unwrap();
    assert_eq!(check_ins.len(), 1);
    assert_eq!(check_ins[0].weight, Some(79.5));
    assert_eq!(check_ins[0].activities, vec!["Promenerade", "Yoga"]);
    drop(store);

    let message = exec(&[
        "kramar", "--db", &db_arg(&db), "generate", "motivation", "--user", "anna",
        "--api-key", "k", "--ai-base-url", &server.uri(),
    ])
    .await
    .unwrap();
    assert_eq!(message, "Härligt med en promenad!\n");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("Promenad i solen"));
}

#[tokio::test]
async fn check_in_scores_are_validated() {
    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let err = exec(&[
        "kramar", "--db", &db_arg(&db), "check-in", "--user", "anna", "--mood", "11",
        "--energy", "5",
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("mood"), "{err}");
}

// ── Generation ──────────────────────────────────────────────────

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "content": [{ "type": "text", "text": text }],
    }))
}

#[tokio::test]
async fn generated_plan_is_printed_and_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(text_response("Vecka 1: cykla till jobbet."))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let output = exec(&[
        "kramar",
        "--db",
        &db_arg(&db),
        "generate",
        "plan",
        "--user",
        "anna",
        "--api-key",
        "k",
        "--ai-base-url",
        &server.uri(),
    ])
    .await
    .unwrap();
    assert_eq!(output, "Vecka 1: cykla till jobbet.\n");

    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let plans: Vec<HealthPlan> = store.get_all_records(Collection::HealthPlans).await.unwrap();
    assert!(plans.iter().any(|p| p.plan == "Vecka 1: cykla till jobbet."));
}

#[tokio::test]
async fn plan_generation_failure_reports_a_friendly_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let err = exec(&[
        "kramar",
        "--db",
        &db_arg(&db),
        "generate",
        "plan",
        "--user",
        "anna",
        "--api-key",
        "bad",
        "--ai-base-url",
        &server.uri(),
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Kontrollera din API-nyckel"));
}

#[tokio::test]
async fn motivation_falls_back_when_generation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let check_in = DailyCheckIn::new("anna", Utc::now(), 8, 7).unwrap();
    store
        .store_record(Collection::DailyCheckIns, &check_in)
        .await
        .unwrap();
    drop(store);

    let output = exec(&[
        "kramar",
        "--db",
        &db_arg(&db),
        "generate",
        "motivation",
        "--user",
        "anna",
        "--api-key",
        "k",
        "--ai-base-url",
        &server.uri(),
    ])
    .await
    .unwrap();
    assert_eq!(output, format!("{}\n", kramar_ai::FALLBACK_MOTIVATION));
}

fn chat_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
    }))
}

#[tokio::test]
async fn openai_recipe_from_food_lists_is_added_to_the_book() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-o"))
        .respond_with(chat_response(
            r#"{"title": "Laxpasta", "ingredients": ["Lax", "Pasta"], "instructions": ["Koka"], "cookingTime": "25 min", "servings": "2"}"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let db = db_arg(&db);
    exec(&["kramar", "--db", &db, "food-list", "set", "--user", "anna", "--yes", "Lax"])
        .await
        .unwrap();

    let uri = server.uri();
    let args = [
        "kramar", "--db", db.as_str(), "generate", "recipe", "--user", "anna", "--provider",
        "openai", "--api-key", "sk-o", "--ai-base-url", uri.as_str(),
    ];
    let output = exec(&args).await.unwrap();
    assert_eq!(output, "Laxpasta (25 min)\n- Lax\n- Pasta\n");
    exec(&args).await.unwrap();

    let store = SqliteStore::open(Path::new(&db)).unwrap();
    store.init().await.unwrap();
    let book: RecipeBook = store
        .get_record(Collection::Recipes, "anna")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.recipes.len(), 2);
    assert_ne!(book.recipes[0].id, book.recipes[1].id);
    assert!(book.recipes.iter().all(|r| r.source == RecordSource::Ai));
}

#[tokio::test]
async fn link_recipe_keeps_its_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(text_response(r#"{"title": "Grönsakssoppa", "cookingTime": "40 min"}"#))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    exec(&[
        "kramar", "--db", &db_arg(&db), "generate", "recipe", "--user", "anna", "--link",
        "https://example.com/soppa", "--api-key", "k", "--ai-base-url", &server.uri(),
    ])
    .await
    .unwrap();

    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let book: RecipeBook = store
        .get_record(Collection::Recipes, "anna")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.recipes[0].source, RecordSource::Link);
    assert_eq!(
        book.recipes[0].source_url.as_deref(),
        Some("https://example.com/soppa")
    );
}

#[tokio::test]
async fn recipe_without_food_lists_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(text_response("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let err = exec(&[
        "kramar", "--db", &db_arg(&db), "generate", "recipe", "--user", "anna", "--api-key",
        "k", "--ai-base-url", &server.uri(),
    ])
    .await
    .unwrap_err();
    assert!(err.to_string().contains("food-list set"), "{err}");
}

#[tokio::test]
async fn activity_suggestions_skip_known_activities_and_are_stored() {
    let server = MockServer::start().await;
    let answer = json!([
        { "name": "Cykling", "description": "Till jobbet", "duration": "30 min", "difficulty": "Medel", "category": "Kondition" },
        { "name": "Meditation", "duration": "10 min", "difficulty": "Lätt", "category": "Mental hälsa" }
    ])
    .to_string();
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(text_response(&answer))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = seeded_db(&dir).await;
    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let existing = ActivityLog {
        user_id: "anna".into(),
        activities: vec![kramar_types::Activity::new(
            "anna",
            "Simning",
            kramar_types::Difficulty::Medium,
            kramar_types::ActivityCategory::Cardio,
            RecordSource::Manual,
        )],
    };
    store
        .store_record(Collection::Activities, &existing)
        .await
        .unwrap();
    drop(store);

    let output = exec(&[
        "kramar", "--db", &db_arg(&db), "generate", "activities", "--user", "anna",
        "--api-key", "k", "--ai-base-url", &server.uri(),
    ])
    .await
    .unwrap();
    assert_eq!(output, "Cykling (30 min, Medel)\nMeditation (10 min, Lätt)\n");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["messages"][0]["content"].as_str().unwrap().contains("Simning"));

    let store = SqliteStore::open(&db).unwrap();
    store.init().await.unwrap();
    let log: ActivityLog = store
        .get_record(Collection::Activities, "anna")
        .await
        .unwrap()
        .unwrap();
    let names: Vec<&str> = log.activities.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Simning", "Cykling", "Meditation"]);
    assert_eq!(log.activities[1].source, RecordSource::Ai);
}

#[test]
fn unknown_provider_is_a_parse_error() {
    assert!(Cli::try_parse_from([
        "kramar", "generate", "plan", "--user", "anna", "--provider", "gemini",
    ])
    .is_err());
}
