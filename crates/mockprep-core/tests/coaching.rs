mod common;

use std::sync::Arc;

use common::*;
use mockprep_core::badges::BadgeRegistry;
use mockprep_core::coach::InterviewStepParams;
use mockprep_core::config::EngineConfig;
use mockprep_core::in_memory::InMemoryStore;
use mockprep_core::model::{Difficulty, Question};
use mockprep_core::selector::{QuestionSelectionParams, SelectionTier};
use mockprep_core::service::CoachingService;
use mockprep_core::store::StoreReader;

fn service(store: Arc<InMemoryStore>, config: EngineConfig) -> CoachingService {
    let scorer = Arc::new(ScriptedScorer::always(STRONG_REPLY));
    CoachingService::try_new(scorer, store, config, BadgeRegistry::default()).unwrap()
}

#[tokio::test]
async fn full_turn_evaluates_then_adapts() {
    let (store, session) = seeded_store();
    let service = service(store.clone(), fast_config());

    let output = service
        .evaluate_response(&input(&session.id, "easy-http"))
        .await;
    assert!(output.success);

    let step = service
        .process_interview_step(InterviewStepParams {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            current_difficulty: Difficulty::Easy,
            evaluation: output.evaluation.unwrap(),
            category: None,
        })
        .await;

    assert_eq!(step.next_difficulty, Difficulty::Medium);
    // "Caching" is the evaluation's weak topic, so the caching question wins
    assert_eq!(step.next_question.unwrap().id, "med-cache");
    assert_eq!(step.top_weak_skills[0].topic, "caching");

    let stored = store.find_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.difficulty, Difficulty::Medium);
    assert_eq!(stored.overall_score, 73.5);
}

#[tokio::test]
async fn failing_memory_still_returns_adaptive_result() {
    let (store, session) = seeded_store();
    let scorer = Arc::new(ScriptedScorer::always(STRONG_REPLY));
    let service = CoachingService::with_memory(
        scorer,
        store,
        Arc::new(FailingMemory),
        fast_config(),
        BadgeRegistry::default(),
    )
    .unwrap();

    let evaluation = mockprep_core::validator::safe_parse(STRONG_REPLY).data;
    let step = service
        .process_interview_step(InterviewStepParams {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            current_difficulty: Difficulty::Medium,
            evaluation,
            category: None,
        })
        .await;

    assert!(step.updated_weak_skills.is_empty());
    assert!(step.top_weak_skills.is_empty());
    assert_eq!(step.next_difficulty, Difficulty::Hard);
    assert_eq!(step.next_question.unwrap().id, "hard-raft");
}

#[tokio::test]
async fn hard_only_bank_and_easy_request() {
    let store = Arc::new(InMemoryStore::new());
    let session = store.create_session("user-1", Difficulty::Easy).unwrap();
    store
        .insert_questions([Question::new("h1", "Design a rate limiter", Difficulty::Hard, "design")])
        .unwrap();
    let params = QuestionSelectionParams {
        session_id: session.id.clone(),
        difficulty: Some(Difficulty::Easy),
        ..Default::default()
    };

    let strict = service(store.clone(), fast_config());
    assert!(strict.select_next_question(&params).await.unwrap().is_none());

    let relaxed = service(
        store,
        EngineConfig {
            cross_difficulty_fallback: true,
            ..fast_config()
        },
    );
    let selected = relaxed.select_next_question(&params).await.unwrap().unwrap();
    assert_eq!(selected.tier, SelectionTier::CrossDifficulty);
    assert_eq!(selected.question.id, "h1");
}

#[tokio::test]
async fn badges_are_awarded_once() {
    let (store, session) = seeded_store();
    let service = service(store.clone(), fast_config());

    assert!(service
        .get_user_badges(&session.user_id)
        .await
        .unwrap()
        .is_empty());

    // An open session with no answers is not a completed interview.
    assert!(service
        .evaluate_and_award_badges(&session.user_id)
        .await
        .is_empty());

    let output = service
        .evaluate_response(&input(&session.id, "easy-http"))
        .await;
    assert!(output.success);

    let first = service.evaluate_and_award_badges(&session.user_id).await;
    assert!(first.iter().any(|b| b.name == "First Steps"));
    assert!(first.iter().all(|b| b.is_new));

    let second = service.evaluate_and_award_badges(&session.user_id).await;
    assert_eq!(second.len(), first.len());
    assert!(second.iter().all(|b| !b.is_new));

    assert_eq!(
        store.user_badges(&session.user_id).await.unwrap().len(),
        first.len()
    );
}

#[tokio::test]
async fn badges_use_latest_session_breakdown() {
    let (store, session) = seeded_store();
    let excellent = r#"{"technical_score":95,"communication_score":88,"confidence_score":72,"logic_score":90,"depth_score":86,"difficulty_recommendation":"increase","feedback":"Excellent","ideal_answer":"i","improvement_tip":"t"}"#;
    let scorer = Arc::new(ScriptedScorer::always(excellent));
    let service =
        CoachingService::try_new(scorer, store.clone(), fast_config(), BadgeRegistry::default())
            .unwrap();
    store.set_readiness(&session.user_id, 81.0).unwrap();

    let output = service
        .evaluate_response(&input(&session.id, "easy-sql"))
        .await;
    assert!(output.success);

    let awarded = service.evaluate_and_award_badges(&session.user_id).await;
    let mut names: Vec<_> = awarded.iter().map(|b| b.name.as_str()).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Deep Diver",
            "First Steps",
            "Great Communicator",
            "Interview Ready",
            "Logical Thinker",
            "Technical Expert",
            "Well Rounded",
        ]
    );
    assert!(awarded.iter().all(|b| b.is_new));
}

#[test]
fn service_rejects_invalid_weights() {
    let store = Arc::new(InMemoryStore::new());
    let mut config = EngineConfig::default();
    config.weights.technical = 0.9;
    let scorer = Arc::new(ScriptedScorer::always(STRONG_REPLY));
    let result = CoachingService::try_new(scorer, store, config, BadgeRegistry::default());
    assert!(result.is_err());
}
