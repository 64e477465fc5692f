//! Mock scorer for testing and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use mockprep_core::traits::{ModelInfo, ScoreRequest, ScoreResponse, Scorer, TokenUsage};

const ANSWER_START: &str = "Candidate answer:\n";
const ANSWER_END: &str = "\n\nScore each dimension";

/// A scorer that never touches the network.
///
/// By default it grades the candidate answer found in the prompt with a
/// deterministic heuristic based on its length and structure. It can also
/// return fixed replies, or replies keyed by a prompt substring.
pub struct MockScorer {
    /// Map of prompt substring → reply.
    responses: HashMap<String, String>,
    /// Reply when no substring matches. `None` means grade heuristically.
    default_response: Option<String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ScoreRequest>>,
}

impl Default for MockScorer {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl MockScorer {
    /// Create a mock with prompt→reply mappings, grading anything else.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same reply.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            default_response: Some(response.to_string()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ScoreRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

/// Pull the candidate's answer back out of an evaluation prompt.
fn extract_answer(prompt: &str) -> &str {
    prompt
        .split_once(ANSWER_START)
        .map(|(_, rest)| rest.split_once(ANSWER_END).map_or(rest, |(a, _)| a))
        .unwrap_or(prompt)
        .trim()
}

/// Deterministic grade of an answer, as scorer-shaped JSON.
pub fn heuristic_evaluation(answer: &str) -> String {
    let words = answer.split_whitespace().count();
    let sentences = answer
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let lower = answer.to_lowercase();
    let has_example = ["for example", "e.g.", "for instance", "such as"]
        .iter()
        .any(|m| lower.contains(m));
    let has_tradeoff = ["trade-off", "tradeoff", "however", "downside", "but "]
        .iter()
        .any(|m| lower.contains(m));

    let base = (35.0 + words as f64 * 0.9).min(92.0);
    let avg_sentence = words as f64 / sentences as f64;
    let communication = if (8.0..=25.0).contains(&avg_sentence) {
        base + 5.0
    } else {
        base - 5.0
    };
    let depth = if has_tradeoff { base + 6.0 } else { base - 8.0 };
    let logic = if has_example { base + 4.0 } else { base - 2.0 };
    let confidence = if lower.contains("i think") || lower.contains("maybe") {
        base - 10.0
    } else {
        base
    };

    let mut weak_topics = Vec::new();
    let mut strengths = Vec::new();
    if has_example {
        strengths.push("concrete examples");
    } else {
        weak_topics.push("examples");
    }
    if has_tradeoff {
        strengths.push("trade-off analysis");
    } else {
        weak_topics.push("trade-offs");
    }
    if words < 25 {
        weak_topics.push("depth");
    }

    let tip = if has_example {
        "Close with a short summary of your recommendation."
    } else {
        "Add a concrete example from your own experience."
    };
    let recommendation = if base >= 75.0 {
        "increase"
    } else if base < 50.0 {
        "decrease"
    } else {
        "maintain"
    };

    json!({
        "technical_score": base,
        "communication_score": communication,
        "confidence_score": confidence,
        "logic_score": logic,
        "depth_score": depth,
        "difficulty_recommendation": recommendation,
        "weak_topics": weak_topics,
        "strengths": strengths,
        "feedback": format!("Answer of {words} words across {sentences} sentences."),
        "ideal_answer": "State the core idea, support it with an example, then discuss trade-offs.",
        "improvement_tip": tip,
    })
    .to_string()
}

#[async_trait]
impl Scorer for MockScorer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn score(&self, request: &ScoreRequest) -> anyhow::Result<ScoreResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .or_else(|| self.default_response.clone())
            .unwrap_or_else(|| heuristic_evaluation(extract_answer(&request.prompt)));

        let prompt_tokens = (request.prompt.len() / 4) as u32; // Rough estimate
        let completion_tokens = (content.len() / 4) as u32;

        Ok(ScoreResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                estimated_cost_usd: 0.0,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-scorer".into(),
            name: "Mock Scorer".into(),
            provider: "mock".into(),
            max_context: 100_000,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockprep_core::model::{Difficulty, InterviewMode};
    use mockprep_core::traits::{build_evaluation_prompt, PromptContext};
    use mockprep_core::validator::safe_parse;

    fn request(prompt: String) -> ScoreRequest {
        ScoreRequest {
            model: "mock-scorer".into(),
            prompt,
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    fn prompt_for(answer: &str) -> String {
        build_evaluation_prompt(&PromptContext {
            question: "How would you cache API responses?",
            answer,
            role: "Backend Engineer",
            difficulty: Difficulty::Medium,
            mode: InterviewMode::Technical,
        })
    }

    #[tokio::test]
    async fn fixed_response() {
        let scorer = MockScorer::with_fixed_response("{\"technical_score\": 1}");
        let response = scorer.score(&request("anything".into())).await.unwrap();
        assert_eq!(response.content, "{\"technical_score\": 1}");
        assert_eq!(scorer.call_count(), 1);
        assert_eq!(scorer.last_request().unwrap().prompt, "anything");
    }

    #[tokio::test]
    async fn prompt_matching_takes_precedence() {
        let mut responses = HashMap::new();
        responses.insert("cache".to_string(), "cached reply".to_string());
        let scorer = MockScorer::new(responses);

        let hit = scorer.score(&request(prompt_for("Use Redis"))).await.unwrap();
        assert_eq!(hit.content, "cached reply");

        let miss = scorer.score(&request("unrelated".into())).await.unwrap();
        assert!(safe_parse(&miss.content).success);
        assert_eq!(scorer.call_count(), 2);
    }

    #[test]
    fn answer_is_extracted_from_prompt() {
        let prompt = prompt_for("Put a CDN in front of it.");
        assert_eq!(extract_answer(&prompt), "Put a CDN in front of it.");
        assert_eq!(extract_answer("  raw text "), "raw text");
    }

    #[tokio::test]
    async fn heuristic_output_is_valid_and_deterministic() {
        let scorer = MockScorer::default();
        let short = prompt_for("Use a cache.");
        let long = prompt_for(
            "I would put a read-through cache in front of the service, for example Redis with a \
             TTL per endpoint. Invalidation happens on writes through a message bus. However, the \
             trade-off is staleness, so for balances I would skip caching entirely and read from \
             the primary. I would measure hit rate and p99 latency to size the cluster.",
        );

        let a = scorer.score(&request(short.clone())).await.unwrap().content;
        let b = scorer.score(&request(short)).await.unwrap().content;
        assert_eq!(a, b);

        let short_eval = safe_parse(&a);
        assert!(short_eval.success, "{:?}", short_eval.errors);
        assert!(short_eval.data.weak_topics.contains(&"depth".to_string()));

        let long_eval = safe_parse(&scorer.score(&request(long)).await.unwrap().content);
        assert!(long_eval.success);
        assert!(long_eval.data.technical_score > short_eval.data.technical_score);
        assert!(long_eval.data.strengths.contains(&"trade-off analysis".to_string()));
    }
}
