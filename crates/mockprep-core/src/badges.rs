//! Achievement badges.
//!
//! Rules are data: a name, a description and a predicate over a
//! [`BadgeContext`]. The engine evaluates every rule inside one transaction and
//! awards the ones whose predicate holds. Awarding is idempotent: a badge the
//! user already holds is reported with `is_new = false` and never re-created,
//! and the store rejects a second row for the same (user, name).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EngineError, StoreError};
use crate::model::Badge;
use crate::store::{with_transaction, Store};

/// Everything a badge predicate may look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BadgeContext {
    pub readiness_score: f64,
    pub technical: f64,
    pub communication: f64,
    pub confidence: f64,
    pub logic: f64,
    pub depth: f64,
    pub total_sessions: u32,
}

impl BadgeContext {
    fn dimensions(&self) -> [f64; 5] {
        [
            self.technical,
            self.communication,
            self.confidence,
            self.logic,
            self.depth,
        ]
    }
}

pub type BadgePredicate = Arc<dyn Fn(&BadgeContext) -> bool + Send + Sync>;

/// One entry in the rule table.
#[derive(Clone)]
pub struct BadgeRule {
    pub name: String,
    pub description: String,
    pub predicate: BadgePredicate,
}

impl BadgeRule {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        predicate: impl Fn(&BadgeContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for BadgeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BadgeRule")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// An ordered, name-unique set of badge rules.
#[derive(Debug, Clone)]
pub struct BadgeRegistry {
    rules: Vec<BadgeRule>,
}

impl BadgeRegistry {
    /// Build a registry. Rule names must be unique and non-empty.
    pub fn new(rules: Vec<BadgeRule>) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if rule.name.trim().is_empty() {
                return Err(EngineError::Config("badge rule name is empty".into()));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate badge rule '{}'",
                    rule.name
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[BadgeRule] {
        &self.rules
    }
}

impl Default for BadgeRegistry {
    fn default() -> Self {
        Self {
            rules: vec![
                BadgeRule::new("First Steps", "Completed your first mock interview", |c| {
                    c.total_sessions >= 1
                }),
                BadgeRule::new("Dedicated Learner", "Completed 5 mock interviews", |c| {
                    c.total_sessions >= 5
                }),
                BadgeRule::new("Interview Veteran", "Completed 20 mock interviews", |c| {
                    c.total_sessions >= 20
                }),
                BadgeRule::new("Technical Expert", "Technical score of 85 or higher", |c| {
                    c.technical >= 85.0
                }),
                BadgeRule::new(
                    "Great Communicator",
                    "Communication score of 85 or higher",
                    |c| c.communication >= 85.0,
                ),
                BadgeRule::new("Confident Speaker", "Confidence score of 85 or higher", |c| {
                    c.confidence >= 85.0
                }),
                BadgeRule::new("Logical Thinker", "Logic score of 85 or higher", |c| {
                    c.logic >= 85.0
                }),
                BadgeRule::new("Deep Diver", "Depth score of 85 or higher", |c| {
                    c.depth >= 85.0
                }),
                BadgeRule::new("Interview Ready", "Readiness score of 80 or higher", |c| {
                    c.readiness_score >= 80.0
                }),
                BadgeRule::new("Well Rounded", "Every dimension at 70 or higher", |c| {
                    c.dimensions().iter().all(|d| *d >= 70.0)
                }),
            ],
        }
    }
}

/// A badge reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardedBadge {
    pub name: String,
    pub description: String,
    pub awarded_at: DateTime<Utc>,
    /// `true` only on the call that created the badge.
    pub is_new: bool,
}

/// Evaluates the rule table and awards badges.
#[derive(Clone)]
pub struct BadgeEngine {
    store: Arc<dyn Store>,
    registry: Arc<BadgeRegistry>,
}

impl BadgeEngine {
    pub fn new(store: Arc<dyn Store>, registry: BadgeRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    /// Evaluate every rule for `user_id` and award the ones that now hold.
    ///
    /// Returns held and newly awarded badges in rule order. Never fails: any
    /// error rolls the transaction back and yields an empty list.
    pub async fn evaluate_and_award_badges(&self, user_id: &str) -> Vec<AwardedBadge> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Vec::new();
        }

        let user = user_id.to_string();
        let registry = Arc::clone(&self.registry);
        let outcome = with_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let readiness = tx.readiness_index(&user).await?.unwrap_or(0.0);
                let latest = tx.latest_score_breakdown(&user).await?;
                let total_sessions = tx.count_completed_sessions(&user).await?;

                let mut ctx = BadgeContext {
                    readiness_score: readiness,
                    total_sessions,
                    ..Default::default()
                };
                if let Some(b) = latest {
                    ctx.technical = b.technical;
                    ctx.communication = b.communication;
                    ctx.confidence = b.confidence;
                    ctx.logic = b.logic;
                    ctx.depth = b.depth;
                }

                let held: HashMap<String, Badge> = tx
                    .user_badges(&user)
                    .await?
                    .into_iter()
                    .map(|b| (b.name.clone(), b))
                    .collect();

                let mut awarded = Vec::new();
                for rule in registry.rules() {
                    if let Some(badge) = held.get(&rule.name) {
                        awarded.push(AwardedBadge {
                            name: badge.name.clone(),
                            description: badge.description.clone(),
                            awarded_at: badge.awarded_at,
                            is_new: false,
                        });
                        continue;
                    }
                    if !(rule.predicate)(&ctx) {
                        continue;
                    }
                    let badge = Badge {
                        user_id: user.clone(),
                        name: rule.name.clone(),
                        description: rule.description.clone(),
                        awarded_at: Utc::now(),
                    };
                    match tx.create_badge(badge).await {
                        Ok(created) => awarded.push(AwardedBadge {
                            name: created.name,
                            description: created.description,
                            awarded_at: created.awarded_at,
                            is_new: true,
                        }),
                        // Another writer got there first; the badge is held.
                        Err(StoreError::Conflict(_)) => awarded.push(AwardedBadge {
                            name: rule.name.clone(),
                            description: rule.description.clone(),
                            awarded_at: Utc::now(),
                            is_new: false,
                        }),
                        Err(e) => return Err(e),
                    }
                }
                Ok(awarded)
            })
        })
        .await;

        match outcome {
            Ok(awarded) => {
                let new = awarded.iter().filter(|b| b.is_new).count();
                if new > 0 {
                    info!(user_id, new, "badges awarded");
                }
                awarded
            }
            Err(e) => {
                error!(user_id, "badge evaluation failed: {e}");
                Vec::new()
            }
        }
    }

    /// Badges the user already holds. Never evaluates eligibility.
    pub async fn user_badges(&self, user_id: &str) -> Result<Vec<Badge>, EngineError> {
        Ok(self.store.user_badges(user_id.trim()).await?)
    }
}
