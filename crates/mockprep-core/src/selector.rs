//! Next-question selection.
//!
//! Selection walks a list of tiers from most to least specific and picks
//! uniformly at random inside the first tier that has candidates. Reads are
//! not locked: the final tier permits repeats, so a race with a concurrent
//! evaluation can at worst re-ask a question.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::model::{normalize_topic, Difficulty, Question};
use crate::store::{QuestionFilter, Store};

/// Input to [`QuestionSelector::select_next_question`].
#[derive(Debug, Clone, Default)]
pub struct QuestionSelectionParams {
    pub session_id: String,
    pub difficulty: Option<Difficulty>,
    /// Preferred category, matched case-insensitively.
    pub category: Option<String>,
    /// Weak-topic hints; any matching category qualifies for the first tier.
    pub weak_topics: Vec<String>,
}

/// Which tier produced a selected question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    /// Difficulty and category/weak-topic match, not yet asked.
    Primary,
    /// Difficulty match, not yet asked.
    Fallback,
    /// Difficulty match, repeats allowed.
    FinalFallback,
    /// Any question in the bank. Only reached when enabled.
    CrossDifficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedQuestion {
    pub question: Question,
    pub tier: SelectionTier,
}

/// Tiered random question selection over a [`Store`].
#[derive(Clone)]
pub struct QuestionSelector {
    store: Arc<dyn Store>,
    cross_difficulty_fallback: bool,
}

impl QuestionSelector {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cross_difficulty_fallback: false,
        }
    }

    /// Allow a last tier that ignores difficulty.
    pub fn with_cross_difficulty_fallback(mut self, enabled: bool) -> Self {
        self.cross_difficulty_fallback = enabled;
        self
    }

    /// Pick the next question for a session.
    ///
    /// Returns `Ok(None)` only when the bank holds no question usable by the
    /// session at the requested difficulty (and the cross-difficulty tier is
    /// disabled or also empty).
    pub async fn select_next_question(
        &self,
        params: &QuestionSelectionParams,
    ) -> Result<Option<SelectedQuestion>, EngineError> {
        let session_id = params.session_id.trim();
        if session_id.is_empty() {
            return Err(EngineError::InputValidation(
                "session_id must not be empty".into(),
            ));
        }
        let difficulty = params
            .difficulty
            .ok_or_else(|| EngineError::InputValidation("difficulty is required".into()))?;

        let asked = self.store.asked_question_ids(session_id).await?;
        let categories = preferred_categories(params);

        let base = QuestionFilter {
            difficulty: Some(difficulty),
            session_id: Some(session_id.to_string()),
            ..Default::default()
        };

        let mut tiers = Vec::with_capacity(4);
        if !categories.is_empty() {
            tiers.push((
                SelectionTier::Primary,
                QuestionFilter {
                    categories: Some(categories),
                    exclude_ids: asked.clone(),
                    ..base.clone()
                },
            ));
        }
        tiers.push((
            SelectionTier::Fallback,
            QuestionFilter {
                exclude_ids: asked,
                ..base.clone()
            },
        ));
        tiers.push((SelectionTier::FinalFallback, base.clone()));
        if self.cross_difficulty_fallback {
            tiers.push((
                SelectionTier::CrossDifficulty,
                QuestionFilter {
                    difficulty: None,
                    ..base
                },
            ));
        }

        for (tier, filter) in tiers {
            let candidates = self.store.find_questions(&filter).await?;
            if let Some(question) = pick(&candidates) {
                debug!(
                    session_id,
                    question_id = %question.id,
                    ?tier,
                    candidates = candidates.len(),
                    "selected next question"
                );
                return Ok(Some(SelectedQuestion { question, tier }));
            }
        }

        debug!(session_id, %difficulty, "no question available");
        Ok(None)
    }
}

/// Requested category plus weak topics, normalized and deduplicated.
fn preferred_categories(params: &QuestionSelectionParams) -> Vec<String> {
    let mut categories: Vec<String> = params
        .category
        .iter()
        .chain(params.weak_topics.iter())
        .map(|c| normalize_topic(c))
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Uniform random choice. Kept synchronous so the rng never lives across an
/// await point.
fn pick(candidates: &[Question]) -> Option<Question> {
    candidates.choose(&mut rand::thread_rng()).cloned()
}
