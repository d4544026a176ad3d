//! Storage traits for archived entities and scrape jobs.
//!
//! The storage layer is split into focused traits:
//! - `SubmoltStore`, `AgentStore`, `PostStore`, `CommentStore`: entity tables,
//!   each keyed by a unique natural key
//! - `JobStore`: scrape job records
//! - `ArchiveStore`: composite trait combining all of them
//!
//! Upserts must be atomic at the storage level: a natural-key collision
//! resolves to an update, never a duplicate row, even when two cycles race.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    job::ScrapeJob,
    record::{
        AgentRecord, AgentUpsert, CommentRecord, CommentUpsert, PostRecord, PostUpsert,
        SubmoltRecord, SubmoltUpsert, Upserted,
    },
};

/// Communities, keyed by lowercased name.
#[async_trait]
pub trait SubmoltStore: Send + Sync {
    /// Get a submolt by name.
    async fn get_submolt(&self, name: &str) -> Result<Option<SubmoltRecord>>;

    /// Insert or update a submolt by name.
    async fn upsert_submolt(&self, submolt: &SubmoltUpsert) -> Result<Upserted>;

    /// All submolts, ordered by name.
    async fn list_submolts(&self) -> Result<Vec<SubmoltRecord>>;
}

/// Agents, keyed by lowercased username.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Get an agent by username.
    async fn get_agent(&self, username: &str) -> Result<Option<AgentRecord>>;

    /// Get an agent by storage id.
    async fn get_agent_by_id(&self, id: Uuid) -> Result<Option<AgentRecord>>;

    /// Insert or update an agent by username.
    async fn upsert_agent(&self, agent: &AgentUpsert) -> Result<Upserted>;

    /// Overwrite the derived counters.
    async fn set_agent_counts(&self, id: Uuid, post_count: u32, comment_count: u32)
        -> Result<()>;

    /// All agents, ordered by username.
    async fn list_agents(&self) -> Result<Vec<AgentRecord>>;
}

/// Posts, keyed by external id.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Get a post by external id.
    async fn get_post(&self, external_id: &str) -> Result<Option<PostRecord>>;

    /// Insert or overwrite a post by external id.
    async fn upsert_post(&self, post: &PostUpsert) -> Result<Upserted>;

    /// Count stored posts authored by an agent.
    async fn count_posts_by_agent(&self, agent_id: Uuid) -> Result<u32>;

    /// Stored posts authored by an agent.
    async fn posts_by_agent(&self, agent_id: Uuid) -> Result<Vec<PostRecord>>;

    /// All posts, ordered by external id.
    async fn list_posts(&self) -> Result<Vec<PostRecord>>;
}

/// Comments, keyed by synthesized external id.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Get a comment by external id.
    async fn get_comment(&self, external_id: &str) -> Result<Option<CommentRecord>>;

    /// Insert or overwrite a comment by external id.
    async fn upsert_comment(&self, comment: &CommentUpsert) -> Result<Upserted>;

    /// Count stored comments authored by an agent.
    async fn count_comments_by_agent(&self, agent_id: Uuid) -> Result<u32>;

    /// Stored comments on a post.
    async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>>;
}

/// Scrape job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    async fn create_job(&self, job: &ScrapeJob) -> Result<()>;

    /// Overwrite a job's status, counters and timestamps.
    async fn update_job(&self, job: &ScrapeJob) -> Result<()>;

    /// Get a job by id.
    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>>;

    /// Whether any job is pending or running.
    async fn has_active_job(&self) -> Result<bool>;

    /// Most recent jobs first.
    async fn list_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>>;
}

/// Composite storage trait combining all tables.
///
/// This is the trait used by the reconciler and the scraper.
pub trait ArchiveStore: SubmoltStore + AgentStore + PostStore + CommentStore + JobStore {}

impl<T> ArchiveStore for T where T: SubmoltStore + AgentStore + PostStore + CommentStore + JobStore {}
