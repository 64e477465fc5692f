//! Answer evaluation orchestrator.
//!
//! One call takes a candidate's answer through input validation, the external
//! scorer (bounded by a timeout, with retries on transient errors), defensive
//! output parsing, and a single atomic write of the response plus the
//! recomputed session aggregate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ProviderError};
use crate::model::{Difficulty, InterviewMode, NewResponse, ScoreBreakdown};
use crate::scoring::{averages, SessionScoreAverages};
use crate::store::{with_transaction, Store};
use crate::traits::{
    build_evaluation_prompt, PromptContext, ScoreRequest, ScoreResponse, Scorer,
    DEFAULT_SYSTEM_PROMPT,
};
use crate::validator::{safe_parse, EvaluationResult};

/// Upper bound on the delay between two scorer retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// One answer to evaluate. Difficulty and mode arrive as caller-supplied
/// strings and are parsed during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub session_id: String,
    pub question_id: String,
    pub user_answer: String,
    pub role: String,
    pub difficulty: String,
    pub mode: String,
}

/// Structured failure carried in an [`EvaluationOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    /// One of the [`EngineError::kind`] labels.
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for EvaluationFailure {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of [`EvaluationEngine::evaluate_response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub success: bool,
    pub response_id: Option<String>,
    pub evaluation: Option<EvaluationResult>,
    pub session_averages: Option<SessionScoreAverages>,
    /// Whether the scorer's output passed strict validation.
    pub llm_output_valid: bool,
    pub validation_errors: Vec<String>,
    /// Whether the evaluation was synthesized because the scorer failed.
    pub used_fallback: bool,
    pub error: Option<EvaluationFailure>,
}

impl EvaluationOutput {
    fn rejected(err: &EngineError) -> Self {
        Self {
            success: false,
            response_id: None,
            evaluation: None,
            session_averages: None,
            llm_output_valid: false,
            validation_errors: Vec::new(),
            used_fallback: false,
            error: Some(err.into()),
        }
    }
}

/// Input after validation.
#[derive(Debug)]
struct ValidatedInput<'a> {
    session_id: &'a str,
    question_id: &'a str,
    answer: &'a str,
    role: &'a str,
    difficulty: Difficulty,
    mode: InterviewMode,
}

fn required(field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        Err(EngineError::InputValidation(format!(
            "{field} must not be empty"
        )))
    } else {
        Ok(())
    }
}

fn validate_input(input: &EvaluationInput) -> Result<ValidatedInput<'_>, EngineError> {
    required("session_id", &input.session_id)?;
    required("question_id", &input.question_id)?;
    required("user_answer", &input.user_answer)?;
    required("role", &input.role)?;

    let difficulty = input
        .difficulty
        .parse::<Difficulty>()
        .map_err(EngineError::InputValidation)?;
    let mode = input
        .mode
        .parse::<InterviewMode>()
        .map_err(EngineError::InputValidation)?;

    Ok(ValidatedInput {
        session_id: input.session_id.trim(),
        question_id: input.question_id.trim(),
        answer: input.user_answer.trim(),
        role: input.role.trim(),
        difficulty,
        mode,
    })
}

/// Registry of per-session async locks.
///
/// Entries that nobody holds are pruned on the next acquisition, so the map
/// only grows with the number of sessions evaluated concurrently.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluates answers and persists the results.
pub struct EvaluationEngine {
    scorer: Arc<dyn Scorer>,
    store: Arc<dyn Store>,
    config: EngineConfig,
    session_locks: SessionLocks,
}

impl EvaluationEngine {
    /// Build an engine, rejecting an invalid configuration.
    pub fn try_new(
        scorer: Arc<dyn Scorer>,
        store: Arc<dyn Store>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            scorer,
            store,
            config,
            session_locks: SessionLocks::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one answer. Never panics and never returns `Err`; failures
    /// are reported through [`EvaluationOutput::error`].
    pub async fn evaluate_response(&self, input: &EvaluationInput) -> EvaluationOutput {
        let input = match validate_input(input) {
            Ok(input) => input,
            Err(e) => {
                debug!("rejected evaluation input: {e}");
                return EvaluationOutput::rejected(&e);
            }
        };

        let question = match self.lookup(&input).await {
            Ok(question) => question,
            Err(e) => {
                debug!(session_id = input.session_id, "rejected evaluation: {e}");
                return EvaluationOutput::rejected(&e);
            }
        };

        let prompt = build_evaluation_prompt(&PromptContext {
            question: &question,
            answer: input.answer,
            role: input.role,
            difficulty: input.difficulty,
            mode: input.mode,
        });

        // The scorer call finishes (or times out) before any lock or
        // transaction is taken.
        let (evaluation, llm_output_valid, validation_errors, used_fallback) =
            match self.call_scorer(&prompt).await {
                Ok(response) => {
                    let parsed = safe_parse(&response.content);
                    if !parsed.success {
                        let e = EngineError::OutputValidation(parsed.errors.join("; "));
                        warn!(session_id = input.session_id, "{e}");
                    }
                    (parsed.data, parsed.success, parsed.errors, false)
                }
                Err(e) => {
                    warn!(
                        session_id = input.session_id,
                        "using fallback evaluation: {e}"
                    );
                    (EvaluationResult::fallback(), false, vec![e.to_string()], true)
                }
            };

        let _guard = self.session_locks.acquire(input.session_id).await;
        let persisted = self.persist(&input, &evaluation).await;

        match persisted {
            Ok((response_id, session_averages)) => {
                info!(
                    session_id = input.session_id,
                    response_id = %response_id,
                    overall = session_averages.overall_score,
                    responses = session_averages.response_count,
                    "evaluation persisted"
                );
                EvaluationOutput {
                    success: true,
                    response_id: Some(response_id),
                    evaluation: Some(evaluation),
                    session_averages: Some(session_averages),
                    llm_output_valid,
                    validation_errors,
                    used_fallback,
                    error: None,
                }
            }
            Err(e) => {
                error!(session_id = input.session_id, "evaluation rolled back: {e}");
                EvaluationOutput {
                    success: false,
                    response_id: None,
                    evaluation: Some(evaluation),
                    session_averages: None,
                    llm_output_valid,
                    validation_errors,
                    used_fallback,
                    error: Some((&e).into()),
                }
            }
        }
    }

    /// Resolve the session and question, returning the question text.
    async fn lookup(&self, input: &ValidatedInput<'_>) -> Result<String, EngineError> {
        if self.store.find_session(input.session_id).await?.is_none() {
            return Err(EngineError::NotFound(format!(
                "session {}",
                input.session_id
            )));
        }
        let question = self
            .store
            .find_question(input.question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("question {}", input.question_id)))?;
        if !question.belongs_to(input.session_id) {
            return Err(EngineError::NotFound(format!(
                "question {} in session {}",
                input.question_id, input.session_id
            )));
        }
        Ok(question.text)
    }

    /// Create the response and recompute the session aggregate atomically.
    async fn persist(
        &self,
        input: &ValidatedInput<'_>,
        evaluation: &EvaluationResult,
    ) -> Result<(String, SessionScoreAverages), EngineError> {
        let session_id = input.session_id.to_string();
        let weights = self.config.weights;
        let response = NewResponse {
            session_id: session_id.clone(),
            question_id: input.question_id.to_string(),
            answer: input.answer.to_string(),
            scores: evaluation.scores(),
            feedback: evaluation.feedback.clone(),
            ideal_answer: evaluation.ideal_answer.clone(),
            improvement_tip: evaluation.improvement_tip.clone(),
        };

        let outcome = with_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let created = tx.create_response(response).await?;
                let scores: Vec<_> = tx
                    .responses_for_session(&session_id)
                    .await?
                    .iter()
                    .map(|r| r.scores)
                    .collect();
                let session_averages = averages(&scores, &weights);
                tx.upsert_score_breakdown(ScoreBreakdown::from_averages(
                    session_id.clone(),
                    &session_averages,
                ))
                .await?;
                tx.update_session_score(&session_id, session_averages.overall_score)
                    .await?;
                Ok((created.id, session_averages))
            })
        })
        .await?;
        Ok(outcome)
    }

    /// Call the scorer inside the configured time budget.
    async fn call_scorer(&self, prompt: &str) -> Result<ScoreResponse, EngineError> {
        let request = ScoreRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            system_prompt: Some(
                self.config
                    .system_prompt_override
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let budget = self.config.scorer_timeout;
        let start = Instant::now();
        match tokio::time::timeout(budget, self.score_with_retries(&request)).await {
            Ok(Ok(response)) => {
                debug!(
                    scorer = self.scorer.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    tokens = response.token_usage.total_tokens,
                    "scorer replied"
                );
                Ok(response)
            }
            Ok(Err(e)) => Err(EngineError::ExternalService(format!("{e:#}"))),
            Err(_) => Err(EngineError::ExternalService(format!(
                "scorer timed out after {}ms",
                budget.as_millis()
            ))),
        }
    }

    /// Retry transient scorer errors with exponential backoff.
    async fn score_with_retries(&self, request: &ScoreRequest) -> anyhow::Result<ScoreResponse> {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            match self.scorer.score(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if let Some(provider_err) = e.downcast_ref::<ProviderError>() {
                        if provider_err.is_permanent() {
                            return Err(e);
                        }
                        // Honor the provider's retry-after hint
                        if let Some(ms) = provider_err.retry_after_ms() {
                            retry_delay = Duration::from_millis(ms).min(MAX_RETRY_DELAY);
                        }
                    }
                    warn!(attempt, scorer = self.scorer.name(), "scorer call failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("scorer produced no response")))
    }
}
