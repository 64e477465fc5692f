//! The external scorer trait and the evaluation prompt.
//!
//! Scorers are implemented by the `mockprep-providers` crate. The engine only
//! relies on plain text in and text out; it makes no assumption about the
//! shape of the reply, which is the validator's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, InterviewMode};

// ---------------------------------------------------------------------------
// Scorer trait
// ---------------------------------------------------------------------------

/// Trait for language-model backends that grade interview answers.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Send a prompt and return the raw reply text.
    async fn score(&self, request: &ScoreRequest) -> anyhow::Result<ScoreResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request sent to a scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Model identifier (e.g. "claude-sonnet-4-20250514").
    pub model: String,
    /// The evaluation prompt.
    pub prompt: String,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Raw reply from a scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// The reply text, expected but not guaranteed to contain JSON.
    pub content: String,
    /// Model that actually produced the reply.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one scorer call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Cost per 1K input tokens in USD.
    pub cost_per_1k_input: f64,
    /// Cost per 1K output tokens in USD.
    pub cost_per_1k_output: f64,
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Default system prompt for scorers.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced technical interviewer grading a candidate's answer. Respond ONLY with a single JSON object matching the requested schema. Do not include explanations or markdown outside the JSON.";

/// Everything the prompt needs to know about one answer.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub role: &'a str,
    pub difficulty: Difficulty,
    pub mode: InterviewMode,
}

/// Render the evaluation prompt for one answer.
pub fn build_evaluation_prompt(ctx: &PromptContext<'_>) -> String {
    format!(
        r#"Evaluate the candidate's answer for a {role} interview.
Interview mode: {mode}
Question difficulty: {difficulty}

Question:
{question}

Candidate answer:
{answer}

Score each dimension from 0 to 100 and reply with this JSON object:
{{
  "technical_score": number,
  "communication_score": number,
  "confidence_score": number,
  "logic_score": number,
  "depth_score": number,
  "difficulty_recommendation": "increase" | "decrease" | "maintain",
  "weak_topics": [string],
  "strengths": [string],
  "feedback": string,
  "ideal_answer": string,
  "improvement_tip": string
}}

Recommend "increase" when the answer is strong for this difficulty, "decrease" when the candidate struggled, and "maintain" otherwise. Weak topics should be short category names."#,
        role = ctx.role.trim(),
        mode = ctx.mode,
        difficulty = ctx.difficulty,
        question = ctx.question.trim(),
        answer = ctx.answer.trim(),
    )
}
