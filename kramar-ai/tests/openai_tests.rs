use kramar_ai::{
    generator_for, ActivityInput, AiConfig, AiError, CheckInSummary, HealthGenerator,
    HealthPlanInput, OpenAiClient, Provider, RecipeInput,
};
use kramar_types::{ActivityCategory, FoodList, UserProfile};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> AiConfig {
    AiConfig {
        api_key: Some("sk-test".into()),
        base_url: server.uri(),
        ..AiConfig::for_provider(Provider::OpenAi)
    }
}

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(config(server)).unwrap()
}

fn chat_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
    }))
}

fn erik() -> UserProfile {
    UserProfile {
        id: "u2".into(),
        name: "Erik".into(),
        current_weight: 90.0,
        target_weight: 82.0,
        height: 185.0,
        age: 41,
        goals: vec!["Bättre sömn".into()],
        lifestyle: vec!["Skiftarbete".into()],
        has_seen_tutorial: None,
    }
}

async fn sent_body(server: &MockServer) -> serde_json::Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests[0].body).unwrap()
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn openai_defaults() {
    let cfg = AiConfig::for_provider(Provider::OpenAi);
    assert_eq!(cfg.base_url, "https://api.openai.com");
    assert_eq!(cfg.model, "gpt-4");
    assert_eq!(cfg.api_key, None);
}

#[test]
fn openai_key_comes_from_its_own_variable() {
    let lookup = |key: &str| match key {
        "OPENAI_API_KEY" => Some("sk-openai".into()),
        "CLAUDE_API_KEY" => Some("sk-claude".into()),
        _ => None,
    };
    let openai = AiConfig::from_lookup_for(Provider::OpenAi, lookup);
    assert_eq!(openai.api_key.as_deref(), Some("sk-openai"));
    assert_eq!(openai.model, "gpt-4");

    let claude = AiConfig::from_lookup_for(Provider::Claude, lookup);
    assert_eq!(claude.api_key.as_deref(), Some("sk-claude"));
}

// ── Requests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_plan_uses_bearer_auth_and_coach_system_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "max_tokens": 2000,
            "temperature": 0.7,
        })))
        .respond_with(chat_response("Vecka 1: sov åtta timmar."))
        .expect(1)
        .mount(&server)
        .await;

    let input = HealthPlanInput {
        user: erik(),
        partner: None,
    };
    let plan = client(&server).health_plan(&input).await.unwrap();
    assert_eq!(plan, "Vecka 1: sov åtta timmar.");

    let body = sent_body(&server).await;
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("hälsocoach"));
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(body["messages"][1]["content"].as_str().unwrap().contains("Erik"));
}

#[tokio::test]
async fn recipe_uses_chef_system_message_and_parses_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "max_tokens": 1500, "temperature": 0.8 })))
        .respond_with(chat_response(
            r#"{"title": "Laxsallad", "ingredients": ["Lax"], "instructions": ["Blanda"], "cookingTime": "15 min", "servings": "2"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let input = RecipeInput::FromPreferences(FoodList {
        user_id: "u2".into(),
        yes: vec!["Lax".into()],
        ..Default::default()
    });
    let recipe = client(&server).recipe(&input).await.unwrap();
    assert_eq!(recipe.title, "Laxsallad");
    assert_eq!(recipe.cooking_time, "15 min");

    let body = sent_body(&server).await;
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("kockexpert"));
}

#[tokio::test]
async fn activity_suggestions_parse_from_chat_content() {
    let server = MockServer::start().await;
    let answer = json!([
        { "name": "Simning", "duration": "45 min", "difficulty": "Medel", "category": "Kondition" }
    ])
    .to_string();
    Mock::given(method("POST"))
        .respond_with(chat_response(&format!("Förslag:\n{answer}")))
        .mount(&server)
        .await;

    let input = ActivityInput {
        user: erik(),
        existing: vec![],
    };
    let suggestions = client(&server).activity_suggestions(&input).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "Simning");
    assert_eq!(suggestions[0].category, ActivityCategory::Cardio);
}

#[tokio::test]
async fn motivation_is_short_and_warm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "max_tokens": 150, "temperature": 0.8 })))
        .respond_with(chat_response("Starkt jobbat!"))
        .expect(1)
        .mount(&server)
        .await;

    let summary = CheckInSummary {
        mood: 9,
        energy: 8,
        notes: "Sprang".into(),
    };
    let message = client(&server).motivational_message(&summary).await.unwrap();
    assert_eq!(message, "Starkt jobbat!");
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn missing_choices_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let summary = CheckInSummary {
        mood: 5,
        energy: 5,
        notes: String::new(),
    };
    let err = client(&server).motivational_message(&summary).await.unwrap_err();
    assert!(matches!(err, AiError::Parse(_)));
}

#[tokio::test]
async fn rejected_key_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let input = HealthPlanInput {
        user: erik(),
        partner: None,
    };
    match client(&server).health_plan(&input).await.unwrap_err() {
        AiError::Auth(msg) => assert_eq!(msg, "Incorrect API key provided"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn generator_for_dispatches_by_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("Från OpenAI"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(Provider::OpenAi, config(&server)).unwrap();
    let input = HealthPlanInput {
        user: erik(),
        partner: None,
    };
    assert_eq!(generator.health_plan(&input).await.unwrap(), "Från OpenAI");
}
