#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use mockprep_core::config::EngineConfig;
use mockprep_core::engine::EvaluationInput;
use mockprep_core::error::EngineError;
use mockprep_core::in_memory::InMemoryStore;
use mockprep_core::memory::{MemoryUpdate, WeakSkillMemory};
use mockprep_core::model::{Difficulty, InterviewSession, Question};
use mockprep_core::traits::{ModelInfo, ScoreRequest, ScoreResponse, Scorer, TokenUsage};

/// A well-formed scorer reply: 90/80/70/60/50, recommend "increase".
pub const STRONG_REPLY: &str = r#"```json
{
  "technical_score": 90,
  "communication_score": 80,
  "confidence_score": 70,
  "logic_score": 60,
  "depth_score": 50,
  "difficulty_recommendation": "increase",
  "weak_topics": ["Caching"],
  "strengths": ["structure"],
  "feedback": "Good coverage of the basics.",
  "ideal_answer": "Explain the trade-offs of an LRU cache.",
  "improvement_tip": "Quantify the memory overhead."
}
```"#;

/// A reply that parses but fails strict validation.
pub const PARTIAL_REPLY: &str = r#"{"technical_score":150,"difficulty_recommendation":"increase","feedback":"ok","ideal_answer":"x","improvement_tip":"y"}"#;

/// One scripted scorer behavior.
pub enum Step {
    Reply(String),
    Fail(String),
    /// Sleep before replying; used to trip the engine's timeout.
    Hang(Duration),
}

/// Scorer that plays back a script, repeating the last step once exhausted.
pub struct ScriptedScorer {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<String>>,
    calls: Mutex<u32>,
}

impl ScriptedScorer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    pub fn always(reply: &str) -> Self {
        let scorer = Self::new(vec![]);
        *scorer.last.lock().unwrap() = Some(reply.to_string());
        scorer
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn score(&self, request: &ScoreRequest) -> anyhow::Result<ScoreResponse> {
        *self.calls.lock().unwrap() += 1;
        let step = self.steps.lock().unwrap().pop_front();
        let content = match step {
            Some(Step::Reply(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                text
            }
            Some(Step::Fail(msg)) => return Err(anyhow!(msg)),
            Some(Step::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                return Err(anyhow!("hung scorer woke up"));
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow!("script exhausted"))?,
        };
        Ok(ScoreResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage::default(),
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![]
    }
}

/// Memory that always fails.
pub struct FailingMemory;

#[async_trait]
impl WeakSkillMemory for FailingMemory {
    async fn process_memory_update(
        &self,
        _user_id: &str,
        _weak_topics: &[String],
    ) -> Result<MemoryUpdate, EngineError> {
        Err(EngineError::ExternalService("memory unavailable".into()))
    }
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        scorer_timeout: Duration::from_millis(200),
        retry_delay: Duration::from_millis(1),
        max_retries: 1,
        ..EngineConfig::default()
    }
}

/// A store with one session for `user-1` and a small bank.
pub fn seeded_store() -> (Arc<InMemoryStore>, InterviewSession) {
    let store = Arc::new(InMemoryStore::new());
    let session = store.create_session("user-1", Difficulty::Easy).unwrap();
    store
        .insert_questions([
            Question::new("easy-http", "What does HTTP stand for?", Difficulty::Easy, "networking"),
            Question::new("easy-sql", "What is a primary key?", Difficulty::Easy, "databases"),
            Question::new("med-cache", "How would you size a cache?", Difficulty::Medium, "caching"),
            Question::new("med-tcp", "Walk through a TCP handshake.", Difficulty::Medium, "networking"),
            Question::new("hard-raft", "Explain leader election in Raft.", Difficulty::Hard, "distributed"),
        ])
        .unwrap();
    (store, session)
}

pub fn input(session_id: &str, question_id: &str) -> EvaluationInput {
    EvaluationInput {
        session_id: session_id.to_string(),
        question_id: question_id.to_string(),
        user_answer: "I would start by clarifying the requirements.".to_string(),
        role: "Backend Engineer".to_string(),
        difficulty: "easy".to_string(),
        mode: "technical".to_string(),
    }
}
