//! Engine configuration.
//!
//! Everything the engine would otherwise read from the environment is passed
//! in explicitly at construction time. [`EngineConfig::validate`] is called by
//! every constructor that accepts a config, so an engine with weights that do
//! not sum to one can never be built.

use std::time::Duration;

use crate::error::EngineError;
use crate::scoring::ScoreWeights;

/// Configuration for the evaluation, coaching, and badge engines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Dimension weights for the overall score.
    pub weights: ScoreWeights,
    /// Hard upper bound on one scorer call, retries included.
    pub scorer_timeout: Duration,
    /// Retries on transient scorer errors.
    pub max_retries: u32,
    /// Initial delay between retries; doubled after each attempt.
    pub retry_delay: Duration,
    /// Model identifier passed to the scorer.
    pub model: String,
    /// Max tokens for the scorer's reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
    /// How many weak skills the memory ranks as "top".
    pub top_weak_skills: usize,
    /// Allow question selection to return a question of another difficulty
    /// when the bank has none at the requested one.
    pub cross_difficulty_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::DEFAULT,
            scorer_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            system_prompt_override: None,
            top_weak_skills: 5,
            cross_difficulty_fallback: false,
        }
    }
}

impl EngineConfig {
    /// Check the startup invariants.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.weights.validate()?;
        if self.scorer_timeout.is_zero() {
            return Err(EngineError::Config(
                "scorer timeout must be greater than zero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EngineError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.top_weak_skills == 0 {
            return Err(EngineError::Config(
                "top_weak_skills must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_weak_skills, 5);
        assert!(!config.cross_difficulty_fallback);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = EngineConfig {
            scorer_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn bad_weights_are_rejected_at_startup() {
        let config = EngineConfig {
            weights: ScoreWeights {
                depth: 0.25,
                ..ScoreWeights::DEFAULT
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
