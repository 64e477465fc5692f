//! Defensive interpretation of external scorer output.
//!
//! The scorer is asked for a JSON object but nothing guarantees it returns
//! one. [`safe_parse`] never fails: it either validates the object strictly,
//! recovers every field it can from a badly shaped object, or falls back to a
//! neutral evaluation when the text is not JSON at all.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Recommendation, ScoreSet};
use crate::scoring::clamp_score;

/// Neutral score used when a dimension cannot be recovered.
pub const FALLBACK_SCORE: f64 = 50.0;

const FALLBACK_FEEDBACK: &str =
    "We could not fully evaluate this answer automatically. Your response has been recorded.";
const FALLBACK_IDEAL_ANSWER: &str = "An ideal answer is not available for this question.";
const FALLBACK_TIP: &str =
    "Structure your answer clearly and support each point with a concrete example.";

const SCORE_FIELDS: [&str; 5] = [
    "technical_score",
    "communication_score",
    "confidence_score",
    "logic_score",
    "depth_score",
];

/// A fully well-formed evaluation of one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub technical_score: f64,
    pub communication_score: f64,
    pub confidence_score: f64,
    pub logic_score: f64,
    pub depth_score: f64,
    pub difficulty_recommendation: Recommendation,
    #[serde(default)]
    pub weak_topics: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    pub feedback: String,
    pub ideal_answer: String,
    pub improvement_tip: String,
}

impl EvaluationResult {
    /// The safe evaluation used whenever nothing better is available.
    pub fn fallback() -> Self {
        Self {
            technical_score: FALLBACK_SCORE,
            communication_score: FALLBACK_SCORE,
            confidence_score: FALLBACK_SCORE,
            logic_score: FALLBACK_SCORE,
            depth_score: FALLBACK_SCORE,
            difficulty_recommendation: Recommendation::Maintain,
            weak_topics: Vec::new(),
            strengths: Vec::new(),
            feedback: FALLBACK_FEEDBACK.to_string(),
            ideal_answer: FALLBACK_IDEAL_ANSWER.to_string(),
            improvement_tip: FALLBACK_TIP.to_string(),
        }
    }

    pub fn scores(&self) -> ScoreSet {
        ScoreSet::new(
            self.technical_score,
            self.communication_score,
            self.confidence_score,
            self.logic_score,
            self.depth_score,
        )
    }

    fn score_slot(&mut self, field: &str) -> Option<&mut f64> {
        match field {
            "technical_score" => Some(&mut self.technical_score),
            "communication_score" => Some(&mut self.communication_score),
            "confidence_score" => Some(&mut self.confidence_score),
            "logic_score" => Some(&mut self.logic_score),
            "depth_score" => Some(&mut self.depth_score),
            _ => None,
        }
    }
}

/// Outcome of [`safe_parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    /// `true` only when the output passed strict validation.
    pub success: bool,
    /// Always well-formed, whatever the input was.
    pub data: EvaluationResult,
    /// One entry per problem found, empty on success.
    pub errors: Vec<String>,
}

/// Remove optional markdown code-fence wrapping from scorer output.
///
/// Handles:
/// - ```json fenced blocks (preferred)
/// - generic ``` fenced blocks
/// - unclosed fences from truncated output
/// - raw text with no fence (returned trimmed)
pub fn strip_code_fence(response: &str) -> String {
    let mut json_block: Option<String> = None;
    let mut generic_block: Option<String> = None;
    let mut in_block = false;
    let mut is_json_block = false;
    let mut current = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            current.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            let block = std::mem::take(&mut current);
            if is_json_block {
                json_block.get_or_insert(block);
            } else {
                generic_block.get_or_insert(block);
            }
            continue;
        }

        if in_block {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    // Truncated output: keep whatever the open fence accumulated
    if in_block && !current.is_empty() {
        if is_json_block {
            json_block.get_or_insert(current);
        } else {
            generic_block.get_or_insert(current);
        }
    }

    json_block
        .or(generic_block)
        .unwrap_or_else(|| response.to_string())
        .trim()
        .to_string()
}

/// Parse and validate raw scorer output. Never panics.
pub fn safe_parse(raw: &str) -> ParseOutcome {
    let text = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            return ParseOutcome {
                success: false,
                data: EvaluationResult::fallback(),
                errors: vec![format!("invalid JSON: {e}")],
            }
        }
    };

    let Some(object) = value.as_object() else {
        return ParseOutcome {
            success: false,
            data: EvaluationResult::fallback(),
            errors: vec![format!(
                "expected a JSON object, received {}",
                type_name(&value)
            )],
        };
    };

    let (data, errors) = validate_object(object);
    ParseOutcome {
        success: errors.is_empty(),
        data,
        errors,
    }
}

/// Validate every field independently.
///
/// Strict validation and partial recovery share one pass: each field either
/// validates, or records an error and contributes whatever could be salvaged,
/// or keeps its fallback value.
fn validate_object(object: &Map<String, Value>) -> (EvaluationResult, Vec<String>) {
    let mut data = EvaluationResult::fallback();
    let mut errors = Vec::new();

    for field in SCORE_FIELDS {
        match object.get(field) {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => {
                    if let Some(slot) = data.score_slot(field) {
                        *slot = clamp_score(v);
                    }
                }
                None => errors.push(format!("{field}: number out of range")),
            },
            Some(other) => errors.push(format!(
                "{field}: expected number, received {}",
                type_name(other)
            )),
            None => errors.push(format!("{field}: required")),
        }
    }

    match object.get("difficulty_recommendation") {
        Some(Value::String(s)) => match s.parse::<Recommendation>() {
            Ok(rec) => data.difficulty_recommendation = rec,
            Err(_) => errors.push(format!(
                "difficulty_recommendation: expected one of increase, decrease, maintain, received '{s}'"
            )),
        },
        Some(other) => errors.push(format!(
            "difficulty_recommendation: expected string, received {}",
            type_name(other)
        )),
        None => errors.push("difficulty_recommendation: required".to_string()),
    }

    data.weak_topics = string_array(object, "weak_topics", &mut errors);
    data.strengths = string_array(object, "strengths", &mut errors);

    if let Some(text) = required_text(object, "feedback", &mut errors) {
        data.feedback = text;
    }
    if let Some(text) = required_text(object, "ideal_answer", &mut errors) {
        data.ideal_answer = text;
    }
    if let Some(text) = required_text(object, "improvement_tip", &mut errors) {
        data.improvement_tip = text;
    }

    (data, errors)
}

/// Optional array of strings. Non-string members are an error but the string
/// members are still kept.
fn string_array(object: &Map<String, Value>, field: &str, errors: &mut Vec<String>) -> Vec<String> {
    match object.get(field) {
        None => Vec::new(),
        Some(Value::Array(items)) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            if strings.len() != items.len() {
                errors.push(format!(
                    "{field}: expected array of strings, {} non-string item(s) dropped",
                    items.len() - strings.len()
                ));
            }
            strings
        }
        Some(other) => {
            errors.push(format!(
                "{field}: expected array, received {}",
                type_name(other)
            ));
            Vec::new()
        }
    }
}

fn required_text(object: &Map<String, Value>, field: &str, errors: &mut Vec<String>) -> Option<String> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            errors.push(format!("{field}: must not be empty"));
            None
        }
        Some(other) => {
            errors.push(format!(
                "{field}: expected string, received {}",
                type_name(other)
            ));
            None
        }
        None => {
            errors.push(format!("{field}: required"));
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
