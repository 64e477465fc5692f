//! Core data model types for mockprep.
//!
//! These are the rows the engine reads and writes through a
//! [`Store`](crate::store::Store): sessions, questions, responses, score
//! breakdowns, weak skills, and badges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::scoring::SessionScoreAverages;

/// Question difficulty, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// All difficulty levels in ascending order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Apply a recommendation, clamping at both ends of the scale.
    pub fn step(self, recommendation: Recommendation) -> Difficulty {
        match (recommendation, self) {
            (Recommendation::Maintain, current) => current,
            (Recommendation::Increase, Difficulty::Easy) => Difficulty::Medium,
            (Recommendation::Increase, _) => Difficulty::Hard,
            (Recommendation::Decrease, Difficulty::Hard) => Difficulty::Medium,
            (Recommendation::Decrease, _) => Difficulty::Easy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Ternary signal driving the next question's difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Increase,
    Decrease,
    #[default]
    Maintain,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Increase => "increase",
            Recommendation::Decrease => "decrease",
            Recommendation::Maintain => "maintain",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    /// Exact, case-sensitive match: scorer output outside the three tokens is
    /// treated as invalid rather than guessed at.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase" => Ok(Recommendation::Increase),
            "decrease" => Ok(Recommendation::Decrease),
            "maintain" => Ok(Recommendation::Maintain),
            other => Err(format!("unknown recommendation: {other}")),
        }
    }
}

/// Kind of interview being conducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewMode {
    Technical,
    Behavioral,
    SystemDesign,
    Mixed,
}

impl InterviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewMode::Technical => "technical",
            InterviewMode::Behavioral => "behavioral",
            InterviewMode::SystemDesign => "system_design",
            InterviewMode::Mixed => "mixed",
        }
    }
}

impl fmt::Display for InterviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "technical" => Ok(InterviewMode::Technical),
            "behavioral" | "behavioural" => Ok(InterviewMode::Behavioral),
            "system_design" => Ok(InterviewMode::SystemDesign),
            "mixed" => Ok(InterviewMode::Mixed),
            other => Err(format!("unknown interview mode: {other}")),
        }
    }
}

/// Normalize a category or topic string for comparison.
pub fn normalize_topic(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A running interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: String,
    pub user_id: String,
    pub difficulty: Difficulty,
    /// Weighted overall score across every answered question so far.
    pub overall_score: f64,
    pub created_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            difficulty,
            overall_score: 0.0,
            created_at: Utc::now(),
        }
    }
}

/// An interview question. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Owning session, or `None` for bank-level questions usable by any session.
    #[serde(default)]
    pub session_id: Option<String>,
    pub text: String,
    pub difficulty: Difficulty,
    /// Lowercased, trimmed category.
    pub category: String,
}

impl Question {
    /// Create a bank-level question, normalizing the category.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        difficulty: Difficulty,
        category: &str,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: None,
            text: text.into(),
            difficulty,
            category: normalize_topic(category),
        }
    }

    /// Scope this question to a single session.
    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Whether the question may be answered inside `session_id`.
    pub fn belongs_to(&self, session_id: &str) -> bool {
        self.session_id.as_deref().map_or(true, |owner| owner == session_id)
    }
}

/// The five per-answer dimension scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSet {
    pub technical: f64,
    pub communication: f64,
    pub confidence: f64,
    pub logic: f64,
    pub depth: f64,
}

impl ScoreSet {
    pub fn new(technical: f64, communication: f64, confidence: f64, logic: f64, depth: f64) -> Self {
        Self {
            technical,
            communication,
            confidence,
            logic,
            depth,
        }
    }

    /// Scores in canonical dimension order.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.technical,
            self.communication,
            self.confidence,
            self.logic,
            self.depth,
        ]
    }
}

/// A response row as handed to the store before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResponse {
    pub session_id: String,
    pub question_id: String,
    pub answer: String,
    pub scores: ScoreSet,
    pub feedback: String,
    pub ideal_answer: String,
    pub improvement_tip: String,
}

/// One answered question. Created exactly once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub answer: String,
    pub scores: ScoreSet,
    pub feedback: String,
    pub ideal_answer: String,
    pub improvement_tip: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session aggregate, always recomputed from the full response set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub session_id: String,
    pub overall_score: f64,
    pub technical: f64,
    pub communication: f64,
    pub confidence: f64,
    pub logic: f64,
    pub depth: f64,
    pub updated_at: DateTime<Utc>,
}

impl ScoreBreakdown {
    pub fn from_averages(session_id: impl Into<String>, averages: &SessionScoreAverages) -> Self {
        Self {
            session_id: session_id.into(),
            overall_score: averages.overall_score,
            technical: averages.technical,
            communication: averages.communication,
            confidence: averages.confidence,
            logic: averages.logic,
            depth: averages.depth,
            updated_at: Utc::now(),
        }
    }
}

/// A recurring weak topic for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakSkill {
    pub user_id: String,
    pub topic: String,
    /// How many evaluations have flagged this topic.
    pub strength: u32,
    pub last_seen: DateTime<Utc>,
}

/// An earned achievement. Presence is the only signal of "earned".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub awarded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_display_and_parse() {
        assert_eq!(Difficulty::Medium.to_string(), "medium");
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn difficulty_step_clamps_at_boundaries() {
        assert_eq!(Difficulty::Hard.step(Recommendation::Increase), Difficulty::Hard);
        assert_eq!(Difficulty::Easy.step(Recommendation::Decrease), Difficulty::Easy);
        assert_eq!(Difficulty::Easy.step(Recommendation::Increase), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.step(Recommendation::Increase), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.step(Recommendation::Decrease), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.step(Recommendation::Decrease), Difficulty::Easy);
        for level in Difficulty::ALL {
            assert_eq!(level.step(Recommendation::Maintain), level);
        }
    }

    #[test]
    fn recommendation_parse_is_exact() {
        assert_eq!(
            "increase".parse::<Recommendation>().unwrap(),
            Recommendation::Increase
        );
        assert!("Increase".parse::<Recommendation>().is_err());
        assert!("up".parse::<Recommendation>().is_err());
    }

    #[test]
    fn interview_mode_parse() {
        assert_eq!(
            "system-design".parse::<InterviewMode>().unwrap(),
            InterviewMode::SystemDesign
        );
        assert_eq!(
            "Behavioral".parse::<InterviewMode>().unwrap(),
            InterviewMode::Behavioral
        );
        assert!("trivia".parse::<InterviewMode>().is_err());
    }

    #[test]
    fn question_category_is_normalized() {
        let q = Question::new("q1", "Explain ownership", Difficulty::Easy, "  Rust Basics ");
        assert_eq!(q.category, "rust basics");
        assert!(q.belongs_to("any-session"));

        let scoped = q.for_session("s1");
        assert!(scoped.belongs_to("s1"));
        assert!(!scoped.belongs_to("s2"));
    }
}
