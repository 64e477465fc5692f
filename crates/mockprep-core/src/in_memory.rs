//! In-memory transactional store.
//!
//! Writers are serialized by a single async lock held for the lifetime of a
//! transaction. Every transaction reads from a private copy of the state and
//! records its writes as a list of changes; commit replays those changes onto
//! the current committed state, so seeding calls made while a transaction is
//! open (sessions, questions, readiness) survive the commit. Reads outside a
//! transaction never wait on a writer; they see the last committed snapshot.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    Badge, Difficulty, InterviewSession, NewResponse, Question, Response, ScoreBreakdown,
    WeakSkill,
};
use crate::store::{QuestionFilter, Store, StoreReader, Transaction};

/// Operation that an [`InMemoryStore`] can be told to fail, for exercising
/// rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Begin,
    CreateResponse,
    UpsertScoreBreakdown,
    UpdateSession,
    CreateBadge,
    UpsertWeakSkill,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct State {
    sessions: BTreeMap<String, InterviewSession>,
    questions: Vec<Question>,
    responses: Vec<Response>,
    breakdowns: HashMap<String, ScoreBreakdown>,
    badges: Vec<Badge>,
    readiness: HashMap<String, f64>,
    weak_skills: BTreeMap<(String, String), WeakSkill>,
}

impl State {
    fn find_session(&self, id: &str) -> Option<InterviewSession> {
        self.sessions.get(id).cloned()
    }

    fn find_question(&self, id: &str) -> Option<Question> {
        self.questions.iter().find(|q| q.id == id).cloned()
    }

    fn responses_for_session(&self, session_id: &str) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Questions answered in the session plus questions scoped to it.
    fn asked_question_ids(&self, session_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .responses
            .iter()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.question_id.clone())
            .collect();
        ids.extend(
            self.questions
                .iter()
                .filter(|q| q.session_id.as_deref() == Some(session_id))
                .map(|q| q.id.clone()),
        );
        ids.sort();
        ids.dedup();
        ids
    }

    fn find_questions(&self, filter: &QuestionFilter) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect()
    }

    /// Breakdown of the most recently started session that has one.
    fn latest_score_breakdown(&self, user_id: &str) -> Option<ScoreBreakdown> {
        self.sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .filter_map(|s| self.breakdowns.get(&s.id).map(|b| (s.created_at, b)))
            .max_by_key(|(created_at, b)| (*created_at, b.updated_at))
            .map(|(_, b)| b.clone())
    }

    /// Sessions with at least one recorded response.
    fn count_completed_sessions(&self, user_id: &str) -> u32 {
        self.sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| self.responses.iter().any(|r| r.session_id == s.id))
            .count() as u32
    }

    fn user_badges(&self, user_id: &str) -> Vec<Badge> {
        self.badges
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }

    fn weak_skills(&self, user_id: &str) -> Vec<WeakSkill> {
        self.weak_skills
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect()
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut InterviewSession, StoreError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            })
    }

    fn apply(&mut self, change: Change) -> Result<(), StoreError> {
        match change {
            Change::Response(row) => self.responses.push(row),
            Change::Breakdown(breakdown) => {
                self.breakdowns
                    .insert(breakdown.session_id.clone(), breakdown);
            }
            Change::SessionScore {
                session_id,
                overall_score,
            } => self.session_mut(&session_id)?.overall_score = overall_score,
            Change::SessionDifficulty {
                session_id,
                difficulty,
            } => self.session_mut(&session_id)?.difficulty = difficulty,
            Change::Badge(badge) => {
                if self
                    .badges
                    .iter()
                    .any(|b| b.user_id == badge.user_id && b.name == badge.name)
                {
                    return Err(StoreError::Conflict(format!(
                        "badge '{}' for user {}",
                        badge.name, badge.user_id
                    )));
                }
                self.badges.push(badge);
            }
            Change::WeakSkill(skill) => {
                self.weak_skills
                    .insert((skill.user_id.clone(), skill.topic.clone()), skill);
            }
        }
        Ok(())
    }
}

/// A write recorded by a transaction, replayed on commit.
#[derive(Debug, Clone)]
enum Change {
    Response(Response),
    Breakdown(ScoreBreakdown),
    SessionScore {
        session_id: String,
        overall_score: f64,
    },
    SessionDifficulty {
        session_id: String,
        difficulty: Difficulty,
    },
    Badge(Badge),
    WeakSkill(WeakSkill),
}

/// Shared fault configuration.
type FaultSlot = Arc<Mutex<Option<FaultPoint>>>;

fn check_fault(slot: &FaultSlot, point: FaultPoint) -> Result<(), StoreError> {
    let armed = slot.lock().map(|f| *f == Some(point)).unwrap_or(false);
    if armed {
        Err(StoreError::Unavailable(format!("injected fault at {point:?}")))
    } else {
        Ok(())
    }
}

/// A [`Store`] held entirely in memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    committed: Arc<RwLock<State>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    fault: FaultSlot,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> Result<R, StoreError> {
        let state = self
            .committed
            .read()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".into()))?;
        Ok(f(&state))
    }

    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R, StoreError> {
        let mut state = self
            .committed
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".into()))?;
        Ok(f(&mut state))
    }

    /// Arm (or with `None`, disarm) a fault that fails the named operation.
    pub fn set_fault(&self, point: Option<FaultPoint>) {
        if let Ok(mut slot) = self.fault.lock() {
            *slot = point;
        }
    }

    /// Insert or replace a session.
    pub fn insert_session(&self, session: InterviewSession) -> Result<(), StoreError> {
        self.write(|s| {
            s.sessions.insert(session.id.clone(), session);
        })
    }

    /// Start a new session for `user_id` with a generated id.
    pub fn create_session(
        &self,
        user_id: &str,
        difficulty: Difficulty,
    ) -> Result<InterviewSession, StoreError> {
        let session = InterviewSession::new(Uuid::new_v4().to_string(), user_id, difficulty);
        self.insert_session(session.clone())?;
        Ok(session)
    }

    /// Add questions to the bank. Ids must be unique.
    pub fn insert_questions(
        &self,
        questions: impl IntoIterator<Item = Question>,
    ) -> Result<usize, StoreError> {
        self.write(|s| {
            let mut added = 0;
            for question in questions {
                if s.questions.iter().any(|q| q.id == question.id) {
                    return Err(StoreError::Conflict(format!("question {}", question.id)));
                }
                s.questions.push(question);
                added += 1;
            }
            Ok(added)
        })?
    }

    /// Seed the externally maintained readiness index.
    pub fn set_readiness(&self, user_id: &str, score: f64) -> Result<(), StoreError> {
        self.write(|s| {
            s.readiness.insert(user_id.to_string(), score);
        })
    }
}

#[async_trait]
impl StoreReader for InMemoryStore {
    async fn find_session(&self, id: &str) -> Result<Option<InterviewSession>, StoreError> {
        self.read(|s| s.find_session(id))
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        self.read(|s| s.find_question(id))
    }

    async fn responses_for_session(&self, session_id: &str) -> Result<Vec<Response>, StoreError> {
        self.read(|s| s.responses_for_session(session_id))
    }

    async fn asked_question_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        self.read(|s| s.asked_question_ids(session_id))
    }

    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError> {
        self.read(|s| s.find_questions(filter))
    }

    async fn score_breakdown(
        &self,
        session_id: &str,
    ) -> Result<Option<ScoreBreakdown>, StoreError> {
        self.read(|s| s.breakdowns.get(session_id).cloned())
    }

    async fn latest_score_breakdown(
        &self,
        user_id: &str,
    ) -> Result<Option<ScoreBreakdown>, StoreError> {
        self.read(|s| s.latest_score_breakdown(user_id))
    }

    async fn readiness_index(&self, user_id: &str) -> Result<Option<f64>, StoreError> {
        self.read(|s| s.readiness.get(user_id).copied())
    }

    async fn count_completed_sessions(&self, user_id: &str) -> Result<u32, StoreError> {
        self.read(|s| s.count_completed_sessions(user_id))
    }

    async fn user_badges(&self, user_id: &str) -> Result<Vec<Badge>, StoreError> {
        self.read(|s| s.user_badges(user_id))
    }

    async fn weak_skills(&self, user_id: &str) -> Result<Vec<WeakSkill>, StoreError> {
        self.read(|s| s.weak_skills(user_id))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        check_fault(&self.fault, FaultPoint::Begin)?;
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.read(State::clone)?;
        Ok(Box::new(InMemoryTransaction {
            working,
            changes: Vec::new(),
            committed: Arc::clone(&self.committed),
            fault: Arc::clone(&self.fault),
            _writer: guard,
        }))
    }
}

/// A transaction against an [`InMemoryStore`].
pub struct InMemoryTransaction {
    working: State,
    changes: Vec<Change>,
    committed: Arc<RwLock<State>>,
    fault: FaultSlot,
    _writer: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    fn record(&mut self, change: Change) -> Result<(), StoreError> {
        self.working.apply(change.clone())?;
        self.changes.push(change);
        Ok(())
    }
}

#[async_trait]
impl StoreReader for InMemoryTransaction {
    async fn find_session(&self, id: &str) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self.working.find_session(id))
    }

    async fn find_question(&self, id: &str) -> Result<Option<Question>, StoreError> {
        Ok(self.working.find_question(id))
    }

    async fn responses_for_session(&self, session_id: &str) -> Result<Vec<Response>, StoreError> {
        Ok(self.working.responses_for_session(session_id))
    }

    async fn asked_question_ids(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.working.asked_question_ids(session_id))
    }

    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, StoreError> {
        Ok(self.working.find_questions(filter))
    }

    async fn score_breakdown(
        &self,
        session_id: &str,
    ) -> Result<Option<ScoreBreakdown>, StoreError> {
        Ok(self.working.breakdowns.get(session_id).cloned())
    }

    async fn latest_score_breakdown(
        &self,
        user_id: &str,
    ) -> Result<Option<ScoreBreakdown>, StoreError> {
        Ok(self.working.latest_score_breakdown(user_id))
    }

    async fn readiness_index(&self, user_id: &str) -> Result<Option<f64>, StoreError> {
        Ok(self.working.readiness.get(user_id).copied())
    }

    async fn count_completed_sessions(&self, user_id: &str) -> Result<u32, StoreError> {
        Ok(self.working.count_completed_sessions(user_id))
    }

    async fn user_badges(&self, user_id: &str) -> Result<Vec<Badge>, StoreError> {
        Ok(self.working.user_badges(user_id))
    }

    async fn weak_skills(&self, user_id: &str) -> Result<Vec<WeakSkill>, StoreError> {
        Ok(self.working.weak_skills(user_id))
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn create_response(&mut self, response: NewResponse) -> Result<Response, StoreError> {
        check_fault(&self.fault, FaultPoint::CreateResponse)?;
        if !self.working.sessions.contains_key(&response.session_id) {
            return Err(StoreError::NotFound {
                entity: "session",
                id: response.session_id,
            });
        }
        if self.working.find_question(&response.question_id).is_none() {
            return Err(StoreError::NotFound {
                entity: "question",
                id: response.question_id,
            });
        }

        let row = Response {
            id: Uuid::new_v4().to_string(),
            session_id: response.session_id,
            question_id: response.question_id,
            answer: response.answer,
            scores: response.scores,
            feedback: response.feedback,
            ideal_answer: response.ideal_answer,
            improvement_tip: response.improvement_tip,
            created_at: Utc::now(),
        };
        self.record(Change::Response(row.clone()))?;
        Ok(row)
    }

    async fn upsert_score_breakdown(&mut self, breakdown: ScoreBreakdown) -> Result<(), StoreError> {
        check_fault(&self.fault, FaultPoint::UpsertScoreBreakdown)?;
        self.record(Change::Breakdown(breakdown))
    }

    async fn update_session_score(
        &mut self,
        session_id: &str,
        overall_score: f64,
    ) -> Result<(), StoreError> {
        check_fault(&self.fault, FaultPoint::UpdateSession)?;
        self.record(Change::SessionScore {
            session_id: session_id.to_string(),
            overall_score,
        })
    }

    async fn update_session_difficulty(
        &mut self,
        session_id: &str,
        difficulty: Difficulty,
    ) -> Result<(), StoreError> {
        check_fault(&self.fault, FaultPoint::UpdateSession)?;
        self.record(Change::SessionDifficulty {
            session_id: session_id.to_string(),
            difficulty,
        })
    }

    async fn create_badge(&mut self, badge: Badge) -> Result<Badge, StoreError> {
        check_fault(&self.fault, FaultPoint::CreateBadge)?;
        self.record(Change::Badge(badge.clone()))?;
        Ok(badge)
    }

    async fn upsert_weak_skill(&mut self, skill: WeakSkill) -> Result<(), StoreError> {
        check_fault(&self.fault, FaultPoint::UpsertWeakSkill)?;
        self.record(Change::WeakSkill(skill))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        check_fault(&self.fault, FaultPoint::Commit)?;
        let mut committed = self
            .committed
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".into()))?;
        // Replay onto a copy so a failed change leaves nothing behind.
        let mut next = committed.clone();
        for change in self.changes.iter().cloned() {
            next.apply(change)?;
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Dropping the recorded changes and the writer guard is the rollback.
        Ok(())
    }
}
