//! Behavioral fingerprint: per-agent writing and activity statistics
//! derived from archived posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::metrics::round2;
use crate::traits::store::{AgentStore, PostStore, SubmoltStore};
use crate::types::record::{AgentRecord, PostRecord};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Derived statistics for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralFingerprint {
    pub username: String,

    /// Σ unique words / Σ words across posts, 2 decimals
    pub vocabulary_diversity: f64,

    /// Mean words per post, rounded
    pub avg_post_length: u32,

    /// Stored post count over active days, 2 decimals
    pub posts_per_day: f64,

    /// Mean upvotes per post, 2 decimals
    pub engagement_ratio: f64,

    /// Σ upvotes
    pub karma: u64,

    /// Submolt the agent posts in most often
    pub primary_submolt: Option<String>,
}

impl BehavioralFingerprint {
    /// Compute from an agent and its posts.
    ///
    /// `submolt_names` maps submolt ids to names. Active days run from
    /// `first_seen_at` to `last_seen_at` (or `now` if never seen again),
    /// at least one.
    pub fn compute(
        agent: &AgentRecord,
        posts: &[PostRecord],
        submolt_names: &HashMap<Uuid, String>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_words: usize = posts.iter().map(|p| p.metrics.word_count).sum();
        let total_unique: usize = posts.iter().map(|p| p.metrics.unique_words).sum();
        let total_upvotes: u64 = posts.iter().map(|p| u64::from(p.upvotes)).sum();

        let last_seen = agent.last_seen_at.unwrap_or(now);
        let elapsed = (last_seen - agent.first_seen_at).num_seconds().max(0) as f64;
        let active_days = (elapsed / SECONDS_PER_DAY).ceil().max(1.0);

        let ratio = |num: f64, den: usize| {
            if den == 0 {
                0.0
            } else {
                round2(num / den as f64)
            }
        };

        Self {
            username: agent.username.clone(),
            vocabulary_diversity: ratio(total_unique as f64, total_words),
            avg_post_length: if posts.is_empty() {
                0
            } else {
                (total_words as f64 / posts.len() as f64).round() as u32
            },
            posts_per_day: round2(f64::from(agent.post_count) / active_days),
            engagement_ratio: ratio(total_upvotes as f64, posts.len()),
            karma: total_upvotes,
            primary_submolt: primary_submolt(posts, submolt_names),
        }
    }
}

/// Most frequent submolt; ties go to the alphabetically first name.
fn primary_submolt(posts: &[PostRecord], names: &HashMap<Uuid, String>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in posts
        .iter()
        .filter_map(|p| p.submolt_id)
        .filter_map(|id| names.get(&id))
    {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(name, _)| name.to_string())
}

/// Load an agent and its posts from storage and compute its fingerprint.
pub async fn fingerprint_for<S>(
    store: &S,
    username: &str,
    now: DateTime<Utc>,
) -> Result<BehavioralFingerprint>
where
    S: AgentStore + PostStore + SubmoltStore,
{
    let key = crate::types::candidate::normalize_key(username);
    let agent = store
        .get_agent(&key)
        .await?
        .ok_or_else(|| ArchiveError::NotFound {
            entity: "agent",
            key: key.clone(),
        })?;

    let posts = store.posts_by_agent(agent.id).await?;
    let names = store
        .list_submolts()
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    Ok(BehavioralFingerprint::compute(&agent, &posts, &names, now))
}
