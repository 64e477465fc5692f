//! Weak-skill memory: per-user accrual and ranking of recurring weak topics.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::model::{normalize_topic, WeakSkill};
use crate::store::{with_transaction, Store};

/// Result of one memory update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUpdate {
    /// Records touched by this update, after the increment.
    pub updated_weak_skills: Vec<WeakSkill>,
    /// The user's highest-ranked weak skills after the update.
    pub top_weak_skills: Vec<WeakSkill>,
}

/// Anything that can remember a user's weak topics.
#[async_trait]
pub trait WeakSkillMemory: Send + Sync {
    async fn process_memory_update(
        &self,
        user_id: &str,
        weak_topics: &[String],
    ) -> Result<MemoryUpdate, EngineError>;
}

/// Order by strength (desc), then most recently seen, then topic name.
pub fn rank_weak_skills(skills: &mut [WeakSkill]) {
    skills.sort_by(|a, b| {
        (Reverse(a.strength), Reverse(a.last_seen), &a.topic).cmp(&(
            Reverse(b.strength),
            Reverse(b.last_seen),
            &b.topic,
        ))
    });
}

/// [`WeakSkillMemory`] persisted through a [`Store`].
#[derive(Clone)]
pub struct StoreMemory {
    store: Arc<dyn Store>,
    top_n: usize,
}

impl StoreMemory {
    pub fn new(store: Arc<dyn Store>, top_n: usize) -> Self {
        Self {
            store,
            top_n: top_n.max(1),
        }
    }
}

#[async_trait]
impl WeakSkillMemory for StoreMemory {
    async fn process_memory_update(
        &self,
        user_id: &str,
        weak_topics: &[String],
    ) -> Result<MemoryUpdate, EngineError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::InputValidation(
                "user_id must not be empty".into(),
            ));
        }

        let topics: BTreeSet<String> = weak_topics
            .iter()
            .map(|t| normalize_topic(t))
            .filter(|t| !t.is_empty())
            .collect();

        let user = user_id.to_string();
        let top_n = self.top_n;
        let update = with_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut existing = tx.weak_skills(&user).await?;
                let now = Utc::now();
                let mut updated = Vec::with_capacity(topics.len());

                for topic in topics {
                    let skill = match existing.iter_mut().find(|s| s.topic == topic) {
                        Some(skill) => {
                            skill.strength += 1;
                            skill.last_seen = now;
                            skill.clone()
                        }
                        None => {
                            let skill = WeakSkill {
                                user_id: user.clone(),
                                topic,
                                strength: 1,
                                last_seen: now,
                            };
                            existing.push(skill.clone());
                            skill
                        }
                    };
                    tx.upsert_weak_skill(skill.clone()).await?;
                    updated.push(skill);
                }

                rank_weak_skills(&mut existing);
                existing.truncate(top_n);
                Ok(MemoryUpdate {
                    updated_weak_skills: updated,
                    top_weak_skills: existing,
                })
            })
        })
        .await?;

        debug!(
            user_id,
            updated = update.updated_weak_skills.len(),
            "weak-skill memory updated"
        );
        Ok(update)
    }
}
