//! Durable records as stored by an [`ArchiveStore`](crate::traits::store::ArchiveStore).
//!
//! Each record carries a surrogate `id` for foreign keys plus the natural key
//! that upserts are resolved on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::TextMetrics;

/// Whether an upsert created a row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Result of an atomic upsert by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: Uuid,
    pub outcome: UpsertOutcome,
}

impl Upserted {
    pub fn inserted(id: Uuid) -> Self {
        Self {
            id,
            outcome: UpsertOutcome::Inserted,
        }
    }

    pub fn updated(id: Uuid) -> Self {
        Self {
            id,
            outcome: UpsertOutcome::Updated,
        }
    }

    pub fn is_insert(&self) -> bool {
        self.outcome == UpsertOutcome::Inserted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmoltRecord {
    pub id: Uuid,
    /// Lowercased, unique
    pub name: String,
    pub description: Option<String>,
    pub member_count: Option<u32>,
    /// Set once on insert
    pub first_seen_at: DateTime<Utc>,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: Uuid,
    /// Lowercased, unique
    pub username: String,
    pub display_name: Option<String>,
    /// Set once on insert
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Recomputed from stored posts after each cycle
    pub post_count: u32,
    /// Recomputed from stored comments after each cycle
    pub comment_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    /// Unique
    pub external_id: String,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub comment_count: u32,
    pub posted_at: Option<DateTime<Utc>>,
    pub agent_id: Option<Uuid>,
    pub submolt_id: Option<Uuid>,
    pub metrics: TextMetrics,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    /// Unique
    pub external_id: String,
    pub content: String,
    pub agent_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub upvotes: u32,
    pub posted_at: Option<DateTime<Utc>>,
    pub word_count: u32,
    pub char_count: u32,
    pub scraped_at: DateTime<Utc>,
}

/// Write model for a submolt sighting.
///
/// On insert: `first_seen_at = last_scraped_at = seen_at`.
/// On conflict: `last_scraped_at = seen_at`; `member_count` and
/// `description` only replaced when `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmoltUpsert {
    pub name: String,
    pub member_count: Option<u32>,
    pub description: Option<String>,
    pub seen_at: DateTime<Utc>,
}

/// Write model for an agent sighting.
///
/// On insert: `first_seen_at = last_seen_at = seen_at`.
/// On conflict: `last_seen_at = seen_at`; `display_name` only replaced when
/// `Some`. `first_seen_at` never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpsert {
    pub username: String,
    pub display_name: Option<String>,
    pub seen_at: DateTime<Utc>,
}

/// Write model for a post. On conflict every mutable field is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct PostUpsert {
    pub external_id: String,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub comment_count: u32,
    pub posted_at: Option<DateTime<Utc>>,
    pub agent_id: Option<Uuid>,
    pub submolt_id: Option<Uuid>,
    pub metrics: TextMetrics,
    pub scraped_at: DateTime<Utc>,
}

/// Write model for a comment. On conflict every mutable field is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentUpsert {
    pub external_id: String,
    pub content: String,
    pub agent_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub upvotes: u32,
    pub posted_at: Option<DateTime<Utc>>,
    pub metrics: TextMetrics,
    pub scraped_at: DateTime<Utc>,
}
