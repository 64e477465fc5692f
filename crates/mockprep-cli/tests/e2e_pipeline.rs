//! End-to-end pipeline tests: HTTP scorer → evaluation → coaching → badges.
//!
//! The scorer talks to a wiremock server speaking the Anthropic Messages API,
//! so these exercise the real request/response path, retries, and fallback.

use std::sync::Arc;
use std::time::Duration;

use mockprep_core::badges::BadgeRegistry;
use mockprep_core::coach::InterviewStepParams;
use mockprep_core::config::EngineConfig;
use mockprep_core::engine::EvaluationInput;
use mockprep_core::in_memory::InMemoryStore;
use mockprep_core::model::{Difficulty, InterviewSession, Question};
use mockprep_core::service::CoachingService;
use mockprep_core::store::{Store, StoreReader};
use mockprep_providers::anthropic::AnthropicScorer;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVALUATION: &str = r#"{
  "technical_score": 90,
  "communication_score": 80,
  "confidence_score": 70,
  "logic_score": 60,
  "depth_score": 50,
  "difficulty_recommendation": "increase",
  "weak_topics": ["Caching"],
  "strengths": ["clear structure"],
  "feedback": "Good coverage of the basics.",
  "ideal_answer": "Discuss TTLs, invalidation and stampedes.",
  "improvement_tip": "Talk about cache stampedes."
}"#;

fn messages_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "content": [{"type": "text", "text": text}],
        "model": "claude-sonnet-4-20250514",
        "usage": {"input_tokens": 400, "output_tokens": 120}
    })
}

fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_session(InterviewSession::new("s1", "u1", Difficulty::Medium))
        .unwrap();
    store
        .insert_questions([
            Question::new("med-cache", "How do you cache?", Difficulty::Medium, "caching"),
            Question::new("hard-cache", "Cache stampedes?", Difficulty::Hard, "Caching"),
            Question::new("hard-db", "Explain MVCC.", Difficulty::Hard, "databases"),
        ])
        .unwrap();
    store
}

fn service(server: &MockServer, store: &InMemoryStore) -> CoachingService {
    let scorer = Arc::new(AnthropicScorer::new("test-key", Some(server.uri())));
    let config = EngineConfig {
        scorer_timeout: Duration::from_secs(10),
        max_retries: 1,
        retry_delay: Duration::from_millis(1),
        ..EngineConfig::default()
    };
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    CoachingService::try_new(scorer, shared, config, BadgeRegistry::default()).unwrap()
}

fn input() -> EvaluationInput {
    EvaluationInput {
        session_id: "s1".into(),
        question_id: "med-cache".into(),
        user_answer: "Put Redis in front of the service with a TTL.".into(),
        role: "Backend Engineer".into(),
        difficulty: "medium".into(),
        mode: "technical".into(),
    }
}

#[tokio::test]
async fn e2e_scored_turn_adapts_and_awards() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(messages_body(&format!(
                "```json\n{EVALUATION}\n```"
            ))),
        )
        .mount(&server)
        .await;

    let store = seeded_store();
    let service = service(&server, &store);

    let output = service.evaluate_response(&input()).await;
    assert!(output.success, "{:?}", output.error);
    assert!(output.llm_output_valid);
    assert!(!output.used_fallback);
    let averages = output.session_averages.unwrap();
    assert!((averages.overall_score - 73.5).abs() < 1e-9);
    assert_eq!(averages.response_count, 1);

    let session = store.find_session("s1").await.unwrap().unwrap();
    assert!((session.overall_score - 73.5).abs() < 1e-9);

    let step = service
        .process_interview_step(InterviewStepParams {
            session_id: "s1".into(),
            user_id: "u1".into(),
            current_difficulty: Difficulty::Medium,
            evaluation: output.evaluation.unwrap(),
            category: None,
        })
        .await;
    assert_eq!(step.next_difficulty, Difficulty::Hard);
    assert_eq!(step.next_question.unwrap().id, "hard-cache");
    assert_eq!(step.top_weak_skills[0].topic, "caching");

    let session = store.find_session("s1").await.unwrap().unwrap();
    assert_eq!(session.difficulty, Difficulty::Hard);

    let badges = service.evaluate_and_award_badges("u1").await;
    let names: Vec<&str> = badges.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["First Steps", "Technical Expert"]);
    assert!(badges.iter().all(|b| b.is_new));
}

#[tokio::test]
async fn e2e_transient_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_body(EVALUATION)))
        .mount(&server)
        .await;

    let store = seeded_store();
    let output = service(&server, &store).evaluate_response(&input()).await;

    assert!(output.success);
    assert!(output.llm_output_valid);
    assert!(!output.used_fallback);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn e2e_auth_failure_falls_back_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let store = seeded_store();
    let output = service(&server, &store).evaluate_response(&input()).await;

    // The answer is still recorded, with neutral scores.
    assert!(output.success);
    assert!(output.used_fallback);
    assert!(!output.llm_output_valid);
    assert!(output.validation_errors[0].contains("authentication"));
    assert!((output.session_averages.unwrap().overall_score - 50.0).abs() < 1e-9);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let responses = store.responses_for_session("s1").await.unwrap();
    assert_eq!(responses.len(), 1);
}

#[tokio::test]
async fn e2e_prose_reply_is_recovered_not_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_body(
            "I think the answer was decent overall.",
        )))
        .mount(&server)
        .await;

    let store = seeded_store();
    let output = service(&server, &store).evaluate_response(&input()).await;

    assert!(output.success);
    assert!(!output.llm_output_valid);
    assert!(!output.used_fallback);
    assert!(!output.validation_errors.is_empty());
    assert_eq!(output.evaluation.unwrap().technical_score, 50.0);
}
