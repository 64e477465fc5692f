//! Per-turn coaching: weak-skill memory plus adaptive difficulty and the next
//! question.
//!
//! The memory update and the adaptive step are independent. A failure in one
//! is logged and replaced by a neutral value; it never prevents the other from
//! producing a result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::memory::{MemoryUpdate, WeakSkillMemory};
use crate::model::{Difficulty, Question, WeakSkill};
use crate::selector::{QuestionSelectionParams, QuestionSelector, SelectedQuestion};
use crate::store::{with_transaction, Store};
use crate::validator::EvaluationResult;

#[derive(Debug, Clone)]
pub struct InterviewStepParams {
    pub session_id: String,
    pub user_id: String,
    pub current_difficulty: Difficulty,
    pub evaluation: EvaluationResult,
    /// Optional category preference for the next question.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewStepResult {
    pub next_difficulty: Difficulty,
    pub next_question: Option<Question>,
    pub updated_weak_skills: Vec<WeakSkill>,
    pub top_weak_skills: Vec<WeakSkill>,
}

struct AdaptiveStep {
    next_difficulty: Difficulty,
    next_question: Option<SelectedQuestion>,
}

/// Combines weak-skill memory with adaptive question selection.
#[derive(Clone)]
pub struct CoachOrchestrator {
    memory: Arc<dyn WeakSkillMemory>,
    selector: QuestionSelector,
    store: Arc<dyn Store>,
}

impl CoachOrchestrator {
    pub fn new(
        memory: Arc<dyn WeakSkillMemory>,
        selector: QuestionSelector,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            memory,
            selector,
            store,
        }
    }

    /// Run one coaching turn. Never fails.
    pub async fn process_interview_step(&self, params: InterviewStepParams) -> InterviewStepResult {
        let evaluation = &params.evaluation;

        let memory = match self
            .memory
            .process_memory_update(&params.user_id, &evaluation.weak_topics)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                warn!(
                    user_id = %params.user_id,
                    kind = e.kind(),
                    "weak-skill memory update failed: {e}"
                );
                MemoryUpdate::default()
            }
        };

        // Steer toward the user's standing weak spots, or this answer's when
        // memory has nothing to offer.
        let hints: Vec<String> = if memory.top_weak_skills.is_empty() {
            evaluation.weak_topics.clone()
        } else {
            memory
                .top_weak_skills
                .iter()
                .map(|s| s.topic.clone())
                .collect()
        };

        let adaptive = match self.adaptive_step(&params, hints).await {
            Ok(step) => step,
            Err(e) => {
                warn!(
                    session_id = %params.session_id,
                    kind = e.kind(),
                    "adaptive step failed: {e}"
                );
                AdaptiveStep {
                    next_difficulty: params.current_difficulty,
                    next_question: None,
                }
            }
        };

        info!(
            session_id = %params.session_id,
            recommendation = %evaluation.difficulty_recommendation,
            next_difficulty = %adaptive.next_difficulty,
            has_question = adaptive.next_question.is_some(),
            "interview step processed"
        );

        InterviewStepResult {
            next_difficulty: adaptive.next_difficulty,
            next_question: adaptive.next_question.map(|s| s.question),
            updated_weak_skills: memory.updated_weak_skills,
            top_weak_skills: memory.top_weak_skills,
        }
    }

    async fn adaptive_step(
        &self,
        params: &InterviewStepParams,
        weak_topics: Vec<String>,
    ) -> Result<AdaptiveStep, EngineError> {
        let next_difficulty = params
            .current_difficulty
            .step(params.evaluation.difficulty_recommendation);

        if next_difficulty != params.current_difficulty {
            let session_id = params.session_id.clone();
            with_transaction(self.store.as_ref(), move |tx| {
                Box::pin(async move {
                    tx.update_session_difficulty(&session_id, next_difficulty)
                        .await
                })
            })
            .await?;
        }

        let next_question = self
            .selector
            .select_next_question(&QuestionSelectionParams {
                session_id: params.session_id.clone(),
                difficulty: Some(next_difficulty),
                category: params.category.clone(),
                weak_topics,
            })
            .await?;

        Ok(AdaptiveStep {
            next_difficulty,
            next_question,
        })
    }
}
