//! Transactional store abstraction.
//!
//! The engine never talks to a database directly. Reads go through
//! [`StoreReader`], which both the store and an open transaction implement;
//! writes only exist on [`Transaction`]. All multi-statement work goes through
//! [`with_transaction`], which commits on `Ok` and rolls back on `Err`.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::StoreError;
use crate::model::{
    Badge, Difficulty, InterviewSession, NewResponse, Question, Response, ScoreBreakdown,
    WeakSkill,
};

/// Filter for question lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    /// Only questions at this difficulty. `None` matches every difficulty.
    pub difficulty: Option<Difficulty>,
    /// Only questions whose normalized category is in this set. `None`
    /// matches every category.
    pub categories: Option<Vec<String>>,
    /// Question ids to leave out.
    pub exclude_ids: Vec<String>,
    /// Only questions usable by this session (bank-level or owned by it).
    pub session_id: Option<String>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != difficulty {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.iter().any(|c| *c == question.category) {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if !question.belongs_to(session_id) {
                return false;
            }
        }
        !self.exclude_ids.contains(&question.id)
    }
}

/// Read operations, available both outside and inside a transaction.
#[async_trait]
pub trait StoreReader: Send + Sync {
    async fn find_session(&self, id: &str) -> Result<Option<InterviewSession>, StoreError>;

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError>;

    /// Every response recorded for the session, oldest first.
    async fn responses_for_session(&self, session_id: &str) -> Result<Vec<Response>, StoreError>;

    /// Ids of questions already asked in the session.
    async fn asked_question_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError>;

    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError>;

    async fn score_breakdown(&self, session_id: &str)
        -> Result<Option<ScoreBreakdown>, StoreError>;

    /// The breakdown of the user's most recently started session that has
    /// one.
    async fn latest_score_breakdown(
        &self,
        user_id: &str,
    ) -> Result<Option<ScoreBreakdown>, StoreError>;

    async fn readiness_index(&self, user_id: &str) -> Result<Option<f64>, StoreError>;

    /// Sessions of the user with at least one recorded response.
    async fn count_completed_sessions(&self, user_id: &str) -> Result<u32, StoreError>;

    async fn user_badges(&self, user_id: &str) -> Result<Vec<Badge>, StoreError>;

    async fn weak_skills(&self, user_id: &str) -> Result<Vec<WeakSkill>, StoreError>;
}

/// An open transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait Transaction: StoreReader {
    async fn create_response(&mut self, response: NewResponse) -> Result<Response, StoreError>;

    async fn upsert_score_breakdown(&mut self, breakdown: ScoreBreakdown) -> Result<(), StoreError>;

    async fn update_session_score(
        &mut self,
        session_id: &str,
        overall_score: f64,
    ) -> Result<(), StoreError>;

    async fn update_session_difficulty(
        &mut self,
        session_id: &str,
        difficulty: Difficulty,
    ) -> Result<(), StoreError>;

    /// Insert a badge. Fails with [`StoreError::Conflict`] if the user
    /// already holds a badge with the same name.
    async fn create_badge(&mut self, badge: Badge) -> Result<Badge, StoreError>;

    async fn upsert_weak_skill(&mut self, skill: WeakSkill) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A store that can open transactions.
#[async_trait]
pub trait Store: StoreReader {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// Run `f` inside a transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A failed
/// rollback is logged and the original error is returned.
pub async fn with_transaction<T, F>(store: &dyn Store, f: F) -> Result<T, StoreError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, Result<T, StoreError>> + Send,
{
    let mut tx = store.begin().await?;
    let outcome = f(tx.as_mut()).await;
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("rollback failed after '{err}': {rollback_err}");
            }
            Err(err)
        }
    }
}
