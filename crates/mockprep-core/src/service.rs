//! Caller-facing API.
//!
//! [`CoachingService`] wires the evaluation engine, coach, selector and badge
//! engine over one shared store and exposes the five entry points callers use.

use std::sync::Arc;

use crate::badges::{AwardedBadge, BadgeEngine, BadgeRegistry};
use crate::coach::{CoachOrchestrator, InterviewStepParams, InterviewStepResult};
use crate::config::EngineConfig;
use crate::engine::{EvaluationEngine, EvaluationInput, EvaluationOutput};
use crate::error::EngineError;
use crate::memory::{StoreMemory, WeakSkillMemory};
use crate::model::Badge;
use crate::selector::{QuestionSelectionParams, QuestionSelector, SelectedQuestion};
use crate::store::Store;
use crate::traits::Scorer;

pub struct CoachingService {
    evaluator: EvaluationEngine,
    coach: CoachOrchestrator,
    selector: QuestionSelector,
    badges: BadgeEngine,
}

impl CoachingService {
    /// Build the service with store-backed weak-skill memory.
    pub fn try_new(
        scorer: Arc<dyn Scorer>,
        store: Arc<dyn Store>,
        config: EngineConfig,
        registry: BadgeRegistry,
    ) -> Result<Self, EngineError> {
        let memory = Arc::new(StoreMemory::new(Arc::clone(&store), config.top_weak_skills));
        Self::with_memory(scorer, store, memory, config, registry)
    }

    /// Build the service with a caller-supplied memory implementation.
    pub fn with_memory(
        scorer: Arc<dyn Scorer>,
        store: Arc<dyn Store>,
        memory: Arc<dyn WeakSkillMemory>,
        config: EngineConfig,
        registry: BadgeRegistry,
    ) -> Result<Self, EngineError> {
        let selector = QuestionSelector::new(Arc::clone(&store))
            .with_cross_difficulty_fallback(config.cross_difficulty_fallback);
        let coach = CoachOrchestrator::new(memory, selector.clone(), Arc::clone(&store));
        let badges = BadgeEngine::new(Arc::clone(&store), registry);
        let evaluator = EvaluationEngine::try_new(scorer, store, config)?;
        Ok(Self {
            evaluator,
            coach,
            selector,
            badges,
        })
    }

    pub async fn evaluate_response(&self, input: &EvaluationInput) -> EvaluationOutput {
        self.evaluator.evaluate_response(input).await
    }

    pub async fn process_interview_step(&self, params: InterviewStepParams) -> InterviewStepResult {
        self.coach.process_interview_step(params).await
    }

    pub async fn select_next_question(
        &self,
        params: &QuestionSelectionParams,
    ) -> Result<Option<SelectedQuestion>, EngineError> {
        self.selector.select_next_question(params).await
    }

    pub async fn evaluate_and_award_badges(&self, user_id: &str) -> Vec<AwardedBadge> {
        self.badges.evaluate_and_award_badges(user_id).await
    }

    pub async fn get_user_badges(&self, user_id: &str) -> Result<Vec<Badge>, EngineError> {
        self.badges.user_badges(user_id).await
    }

    pub fn config(&self) -> &EngineConfig {
        self.evaluator.config()
    }
}
