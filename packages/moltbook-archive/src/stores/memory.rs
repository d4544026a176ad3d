//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::traits::store::{AgentStore, CommentStore, JobStore, PostStore, SubmoltStore};
use crate::types::{
    job::ScrapeJob,
    record::{
        AgentRecord, AgentUpsert, CommentRecord, CommentUpsert, PostRecord, PostUpsert,
        SubmoltRecord, SubmoltUpsert, Upserted,
    },
};

#[derive(Default)]
struct Tables {
    submolts: IndexMap<String, SubmoltRecord>,
    agents: IndexMap<String, AgentRecord>,
    posts: IndexMap<String, PostRecord>,
    comments: IndexMap<String, CommentRecord>,
    jobs: IndexMap<Uuid, ScrapeJob>,
}

impl Tables {
    fn agent_exists(&self, id: Uuid) -> bool {
        self.agents.values().any(|a| a.id == id)
    }

    fn submolt_exists(&self, id: Uuid) -> bool {
        self.submolts.values().any(|s| s.id == id)
    }

    fn post_exists(&self, id: Uuid) -> bool {
        self.posts.values().any(|p| p.id == id)
    }
}

/// In-memory storage for the archive tables.
///
/// Enforces the same natural-key uniqueness, non-empty and foreign-key
/// constraints as the SQL schema. All tables sit behind one lock, so each
/// upsert is atomic. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| ArchiveError::storage_msg("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| ArchiveError::storage_msg("memory store lock poisoned"))
    }

    /// Clear all stored data.
    pub fn clear(&self) -> Result<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    /// Get the number of stored posts.
    pub fn post_count(&self) -> Result<usize> {
        Ok(self.read()?.posts.len())
    }

    /// Get the number of stored agents.
    pub fn agent_count(&self) -> Result<usize> {
        Ok(self.read()?.agents.len())
    }

    /// Get the number of stored submolts.
    pub fn submolt_count(&self) -> Result<usize> {
        Ok(self.read()?.submolts.len())
    }

    /// Get the number of stored comments.
    pub fn comment_count(&self) -> Result<usize> {
        Ok(self.read()?.comments.len())
    }
}

fn require_non_empty(table: &'static str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ArchiveError::Constraint {
            table,
            reason: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

fn missing_reference(table: &'static str, field: &str, id: Uuid) -> ArchiveError {
    ArchiveError::Constraint {
        table,
        reason: format!("{} references missing row {}", field, id),
    }
}

#[async_trait]
impl SubmoltStore for MemoryStore {
    async fn get_submolt(&self, name: &str) -> Result<Option<SubmoltRecord>> {
        Ok(self.read()?.submolts.get(name).cloned())
    }

    async fn upsert_submolt(&self, submolt: &SubmoltUpsert) -> Result<Upserted> {
        require_non_empty("submolts", "name", &submolt.name)?;
        let mut tables = self.write()?;

        if let Some(existing) = tables.submolts.get_mut(&submolt.name) {
            existing.last_scraped_at = Some(submolt.seen_at);
            if submolt.member_count.is_some() {
                existing.member_count = submolt.member_count;
            }
            if submolt.description.is_some() {
                existing.description = submolt.description.clone();
            }
            return Ok(Upserted::updated(existing.id));
        }

        let id = Uuid::new_v4();
        tables.submolts.insert(
            submolt.name.clone(),
            SubmoltRecord {
                id,
                name: submolt.name.clone(),
                description: submolt.description.clone(),
                member_count: submolt.member_count,
                first_seen_at: submolt.seen_at,
                last_scraped_at: Some(submolt.seen_at),
            },
        );
        Ok(Upserted::inserted(id))
    }

    async fn list_submolts(&self) -> Result<Vec<SubmoltRecord>> {
        let mut submolts: Vec<_> = self.read()?.submolts.values().cloned().collect();
        submolts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(submolts)
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn get_agent(&self, username: &str) -> Result<Option<AgentRecord>> {
        Ok(self.read()?.agents.get(username).cloned())
    }

    async fn get_agent_by_id(&self, id: Uuid) -> Result<Option<AgentRecord>> {
        Ok(self.read()?.agents.values().find(|a| a.id == id).cloned())
    }

    async fn upsert_agent(&self, agent: &AgentUpsert) -> Result<Upserted> {
        require_non_empty("agents", "username", &agent.username)?;
        let mut tables = self.write()?;

        if let Some(existing) = tables.agents.get_mut(&agent.username) {
            existing.last_seen_at = Some(agent.seen_at);
            if agent.display_name.is_some() {
                existing.display_name = agent.display_name.clone();
            }
            return Ok(Upserted::updated(existing.id));
        }

        let id = Uuid::new_v4();
        tables.agents.insert(
            agent.username.clone(),
            AgentRecord {
                id,
                username: agent.username.clone(),
                display_name: agent.display_name.clone(),
                first_seen_at: agent.seen_at,
                last_seen_at: Some(agent.seen_at),
                post_count: 0,
                comment_count: 0,
            },
        );
        Ok(Upserted::inserted(id))
    }

    async fn set_agent_counts(
        &self,
        id: Uuid,
        post_count: u32,
        comment_count: u32,
    ) -> Result<()> {
        let mut tables = self.write()?;
        let agent = tables
            .agents
            .values_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ArchiveError::NotFound {
                entity: "agent",
                key: id.to_string(),
            })?;
        agent.post_count = post_count;
        agent.comment_count = comment_count;
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
        let mut agents: Vec<_> = self.read()?.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(agents)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_post(&self, external_id: &str) -> Result<Option<PostRecord>> {
        Ok(self.read()?.posts.get(external_id).cloned())
    }

    async fn upsert_post(&self, post: &PostUpsert) -> Result<Upserted> {
        require_non_empty("posts", "external_id", &post.external_id)?;
        require_non_empty("posts", "title", &post.title)?;
        let mut tables = self.write()?;

        if let Some(agent_id) = post.agent_id {
            if !tables.agent_exists(agent_id) {
                return Err(missing_reference("posts", "agent_id", agent_id));
            }
        }
        if let Some(submolt_id) = post.submolt_id {
            if !tables.submolt_exists(submolt_id) {
                return Err(missing_reference("posts", "submolt_id", submolt_id));
            }
        }

        let (id, outcome) = match tables.posts.get(&post.external_id) {
            Some(existing) => (existing.id, Upserted::updated(existing.id)),
            None => {
                let id = Uuid::new_v4();
                (id, Upserted::inserted(id))
            }
        };

        tables.posts.insert(
            post.external_id.clone(),
            PostRecord {
                id,
                external_id: post.external_id.clone(),
                title: post.title.clone(),
                content: post.content.clone(),
                url: post.url.clone(),
                upvotes: post.upvotes,
                downvotes: post.downvotes,
                comment_count: post.comment_count,
                posted_at: post.posted_at,
                agent_id: post.agent_id,
                submolt_id: post.submolt_id,
                metrics: post.metrics,
                scraped_at: post.scraped_at,
            },
        );
        Ok(outcome)
    }

    async fn count_posts_by_agent(&self, agent_id: Uuid) -> Result<u32> {
        let count = self
            .read()?
            .posts
            .values()
            .filter(|p| p.agent_id == Some(agent_id))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn posts_by_agent(&self, agent_id: Uuid) -> Result<Vec<PostRecord>> {
        Ok(self
            .read()?
            .posts
            .values()
            .filter(|p| p.agent_id == Some(agent_id))
            .cloned()
            .collect())
    }

    async fn list_posts(&self) -> Result<Vec<PostRecord>> {
        let mut posts: Vec<_> = self.read()?.posts.values().cloned().collect();
        posts.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(posts)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn get_comment(&self, external_id: &str) -> Result<Option<CommentRecord>> {
        Ok(self.read()?.comments.get(external_id).cloned())
    }

    async fn upsert_comment(&self, comment: &CommentUpsert) -> Result<Upserted> {
        require_non_empty("comments", "external_id", &comment.external_id)?;
        require_non_empty("comments", "content", &comment.content)?;
        let mut tables = self.write()?;

        if let Some(agent_id) = comment.agent_id {
            if !tables.agent_exists(agent_id) {
                return Err(missing_reference("comments", "agent_id", agent_id));
            }
        }
        if let Some(post_id) = comment.post_id {
            if !tables.post_exists(post_id) {
                return Err(missing_reference("comments", "post_id", post_id));
            }
        }

        let (id, outcome) = match tables.comments.get(&comment.external_id) {
            Some(existing) => (existing.id, Upserted::updated(existing.id)),
            None => {
                let id = Uuid::new_v4();
                (id, Upserted::inserted(id))
            }
        };

        tables.comments.insert(
            comment.external_id.clone(),
            CommentRecord {
                id,
                external_id: comment.external_id.clone(),
                content: comment.content.clone(),
                agent_id: comment.agent_id,
                post_id: comment.post_id,
                upvotes: comment.upvotes,
                posted_at: comment.posted_at,
                word_count: u32::try_from(comment.metrics.word_count).unwrap_or(u32::MAX),
                char_count: u32::try_from(comment.metrics.char_count).unwrap_or(u32::MAX),
                scraped_at: comment.scraped_at,
            },
        );
        Ok(outcome)
    }

    async fn count_comments_by_agent(&self, agent_id: Uuid) -> Result<u32> {
        let count = self
            .read()?
            .comments
            .values()
            .filter(|c| c.agent_id == Some(agent_id))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>> {
        Ok(self
            .read()?
            .comments
            .values()
            .filter(|c| c.post_id == Some(post_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &ScrapeJob) -> Result<()> {
        let mut tables = self.write()?;
        if tables.jobs.contains_key(&job.id) {
            return Err(ArchiveError::Constraint {
                table: "scrape_jobs",
                reason: format!("duplicate job id {}", job.id),
            });
        }
        tables.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &ScrapeJob) -> Result<()> {
        let mut tables = self.write()?;
        let stored = tables
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| ArchiveError::NotFound {
                entity: "scrape job",
                key: job.id.to_string(),
            })?;
        *stored = job.clone();
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn has_active_job(&self) -> Result<bool> {
        Ok(self.read()?.jobs.values().any(|j| j.status.is_active()))
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>> {
        let mut jobs: Vec<_> = self.read()?.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }
}
