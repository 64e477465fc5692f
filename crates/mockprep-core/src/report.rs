//! Session report types with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::badges::AwardedBadge;
use crate::model::Difficulty;
use crate::scoring::SessionScoreAverages;
use crate::validator::EvaluationResult;

/// A complete record of one replayed interview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub role: String,
    pub mode: String,
    /// Scorer provider and model used.
    pub provider: String,
    pub model: String,
    /// One entry per answered question, in order.
    pub turns: Vec<TurnRecord>,
    /// Session averages after the last successful turn.
    pub final_averages: SessionScoreAverages,
    /// Badges held or awarded at the end of the session.
    pub badges: Vec<AwardedBadge>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// One evaluate-then-coach turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub question_id: String,
    pub question_text: String,
    pub difficulty: Difficulty,
    pub answer: String,
    /// Whether the evaluation was persisted.
    pub persisted: bool,
    pub evaluation: Option<EvaluationResult>,
    pub llm_output_valid: bool,
    pub used_fallback: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    /// Running session score after this turn.
    pub overall_after: Option<f64>,
    pub next_difficulty: Difficulty,
    pub next_question_id: Option<String>,
}

impl SessionReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Number of turns whose evaluation came from the fallback path.
    pub fn fallback_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.used_fallback).count()
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let avg = &self.final_averages;

        md.push_str(&format!(
            "## Session {} ({} / {})\n\n",
            self.session_id, self.role, self.mode
        ));
        md.push_str(&format!(
            "**Summary:** {} answers, overall {:.2}, {} fallback evaluations\n\n",
            self.turns.len(),
            avg.overall_score,
            self.fallback_turns()
        ));

        md.push_str("| Technical | Communication | Confidence | Logic | Depth |\n");
        md.push_str("|-----------|---------------|------------|-------|-------|\n");
        md.push_str(&format!(
            "| {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |\n\n",
            avg.technical, avg.communication, avg.confidence, avg.logic, avg.depth
        ));

        if !self.turns.is_empty() {
            md.push_str("### Turns\n\n");
            md.push_str("| # | Question | Difficulty | Overall | Next |\n");
            md.push_str("|---|----------|------------|---------|------|\n");
            for (i, t) in self.turns.iter().enumerate() {
                let overall = t
                    .overall_after
                    .map(|o| format!("{o:.2}"))
                    .unwrap_or_else(|| "-".into());
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    i + 1,
                    t.question_id,
                    t.difficulty,
                    overall,
                    t.next_difficulty
                ));
            }
            md.push('\n');
        }

        if !self.badges.is_empty() {
            md.push_str("### Badges\n\n");
            for b in &self.badges {
                let marker = if b.is_new { " (new)" } else { "" };
                md.push_str(&format!("- **{}**{}: {}\n", b.name, marker, b.description));
            }
        }

        md
    }
}
