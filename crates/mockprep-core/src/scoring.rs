//! Weighted session score aggregation.
//!
//! The aggregator is a pure function over a slice of per-answer score sets.
//! It runs both against a freshly queried response history and against an
//! in-transaction snapshot, so it must not depend on anything but its input.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::ScoreSet;

/// Tolerance used when checking that the weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Per-dimension weights used to compute the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub technical: f64,
    pub communication: f64,
    pub confidence: f64,
    pub logic: f64,
    pub depth: f64,
}

impl ScoreWeights {
    /// Production weights: technical 0.35, communication 0.15, confidence
    /// 0.15, logic 0.20, depth 0.15.
    pub const DEFAULT: ScoreWeights = ScoreWeights {
        technical: 0.35,
        communication: 0.15,
        confidence: 0.15,
        logic: 0.20,
        depth: 0.15,
    };

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.technical,
            self.communication,
            self.confidence,
            self.logic,
            self.depth,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Check that each weight is in `[0, 1]` and that they sum to 1.0.
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(bad) = self
            .as_array()
            .iter()
            .find(|w| !w.is_finite() || **w < 0.0 || **w > 1.0)
        {
            return Err(EngineError::Config(format!(
                "score weight {bad} is outside [0, 1]"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Config(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }

    /// Weighted sum of a set of dimension values.
    pub fn apply(&self, scores: &ScoreSet) -> f64 {
        self.as_array()
            .iter()
            .zip(scores.as_array())
            .map(|(w, s)| w * s)
            .sum()
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Session-level averages computed from every answered question.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionScoreAverages {
    pub technical: f64,
    pub communication: f64,
    pub confidence: f64,
    pub logic: f64,
    pub depth: f64,
    pub overall_score: f64,
    pub response_count: usize,
}

impl SessionScoreAverages {
    /// The five dimension averages as a score set.
    pub fn dimensions(&self) -> ScoreSet {
        ScoreSet::new(
            self.technical,
            self.communication,
            self.confidence,
            self.logic,
            self.depth,
        )
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Clamp into `[0, 100]` and round to two decimals.
pub fn clamp_score(value: f64) -> f64 {
    round2(value.clamp(0.0, 100.0))
}

/// Compute per-dimension means and the weighted overall score.
///
/// Each mean is rounded to two decimals; the overall score is the weighted
/// sum of the rounded means, itself rounded. An empty slice yields all zeros.
pub fn averages(scores: &[ScoreSet], weights: &ScoreWeights) -> SessionScoreAverages {
    if scores.is_empty() {
        return SessionScoreAverages::default();
    }

    let n = scores.len() as f64;
    let mut totals = [0.0f64; 5];
    for set in scores {
        for (total, value) in totals.iter_mut().zip(set.as_array()) {
            *total += value;
        }
    }
    let [technical, communication, confidence, logic, depth] = totals.map(|t| round2(t / n));

    let dimensions = ScoreSet::new(technical, communication, confidence, logic, depth);
    SessionScoreAverages {
        technical,
        communication,
        confidence,
        logic,
        depth,
        overall_score: round2(weights.apply(&dimensions)),
        response_count: scores.len(),
    }
}
