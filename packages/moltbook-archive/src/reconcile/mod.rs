//! Reconciliation: turn one cycle's candidates into durable records.
//!
//! Runs in a fixed order, each step depending on the ones before it:
//!
//! 1. Submolts, building `name → id`
//! 2. Agents, building `username → id`
//! 3. Posts, resolving references through the maps and creating missing
//!    agents and submolts on demand
//! 4. Comments, resolving parent posts and authors
//! 5. Aggregates: `post_count` and `comment_count` of every touched agent,
//!    recounted from storage
//!
//! A failed write is logged and skipped; the rest of the batch continues.
//! Running the same extraction twice leaves storage unchanged.

mod agents;
mod comments;
mod posts;
mod submolts;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::traits::store::ArchiveStore;
use crate::types::{
    candidate::Extraction,
    job::JobSummary,
    record::{UpsertOutcome, Upserted},
};

/// Insert/update/failure counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, upserted: &Upserted) {
        match upserted.outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    /// Rows written, inserted or updated.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// One rejected write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub entity: String,
    pub key: String,
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub submolts: Tally,
    pub agents: Tally,
    pub posts: Tally,
    pub comments: Tally,

    /// Agents whose counters were recomputed
    pub agents_recounted: usize,

    pub failures: Vec<WriteFailure>,
}

impl ReconcileReport {
    /// Job counters for this run. `found` is left for the caller.
    pub fn job_summary(&self) -> JobSummary {
        JobSummary {
            posts_scraped: self.posts.written(),
            agents_discovered: self.agents.inserted,
            submolts_discovered: self.submolts.inserted,
            comments_scraped: self.comments.written(),
            write_failures: self.failures.len(),
            found: Default::default(),
        }
    }
}

/// Scoped state for one run: natural key → storage id maps and the agents
/// whose aggregates need recounting. Dropped when the run ends.
pub struct ReconcileContext {
    now: DateTime<Utc>,
    submolt_ids: HashMap<String, Uuid>,
    agent_ids: HashMap<String, Uuid>,
    post_ids: HashMap<String, Uuid>,
    touched_agents: IndexSet<Uuid>,
    report: ReconcileReport,
}

impl ReconcileContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            submolt_ids: HashMap::new(),
            agent_ids: HashMap::new(),
            post_ids: HashMap::new(),
            touched_agents: IndexSet::new(),
            report: ReconcileReport::default(),
        }
    }

    /// Ingestion time for this run.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Id resolved for a submolt name in this run.
    pub fn submolt_id(&self, name: &str) -> Option<Uuid> {
        self.submolt_ids.get(name).copied()
    }

    /// Id resolved for a username in this run.
    pub fn agent_id(&self, username: &str) -> Option<Uuid> {
        self.agent_ids.get(username).copied()
    }

    /// Id resolved for a post external id in this run.
    pub fn post_id(&self, external_id: &str) -> Option<Uuid> {
        self.post_ids.get(external_id).copied()
    }

    fn fail(&mut self, entity: &'static str, key: &str, error: &ArchiveError) {
        warn!(entity, key = %key, error = %error, "Write failed, skipping");
        self.report.failures.push(WriteFailure {
            entity: entity.to_string(),
            key: key.to_string(),
            error: error.to_string(),
        });
    }

    fn into_report(self) -> ReconcileReport {
        self.report
    }
}

/// Reconciles extracted candidates against an [`ArchiveStore`].
pub struct Reconciler<'a, S> {
    store: &'a S,
}

impl<'a, S: ArchiveStore> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Reconcile one cycle's extraction, stamped with `now`.
    pub async fn reconcile(&self, extraction: &Extraction, now: DateTime<Utc>) -> ReconcileReport {
        let mut ctx = ReconcileContext::new(now);

        self.reconcile_submolts(&mut ctx, &extraction.submolts).await;
        self.reconcile_agents(&mut ctx, &extraction.agents).await;
        self.reconcile_posts(&mut ctx, &extraction.posts).await;
        self.reconcile_comments(&mut ctx, &extraction.comments).await;
        self.recompute_aggregates(&mut ctx).await;

        let report = ctx.into_report();
        info!(
            submolts_inserted = report.submolts.inserted,
            agents_inserted = report.agents.inserted,
            posts_written = report.posts.written(),
            comments_written = report.comments.written(),
            failures = report.failures.len(),
            "Reconciliation complete"
        );
        report
    }

    /// Recount `post_count` and `comment_count` from stored rows for every
    /// agent touched in this run.
    async fn recompute_aggregates(&self, ctx: &mut ReconcileContext) {
        let touched: Vec<Uuid> = ctx.touched_agents.iter().copied().collect();

        for agent_id in touched {
            let counts = async {
                let posts = self.store.count_posts_by_agent(agent_id).await?;
                let comments = self.store.count_comments_by_agent(agent_id).await?;
                self.store.set_agent_counts(agent_id, posts, comments).await?;
                Ok::<_, ArchiveError>((posts, comments))
            }
            .await;

            match counts {
                Ok((posts, comments)) => {
                    debug!(agent_id = %agent_id, posts, comments, "Agent counters recomputed");
                    ctx.report.agents_recounted += 1;
                }
                Err(e) => ctx.fail("agent_counts", &agent_id.to_string(), &e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::traits::store::{AgentStore, CommentStore, PostStore, SubmoltStore};
    use crate::types::candidate::{
        AgentCandidate, CommentCandidate, PostCandidate, SubmoltCandidate,
    };

    fn extraction() -> Extraction {
        Extraction {
            posts: vec![
                PostCandidate::new("p1", "First post")
                    .with_agent("alpha")
                    .with_submolt("agentops")
                    .with_content("hello world")
                    .with_votes(5, 1),
                PostCandidate::new("p2", "Second post").with_agent("newbie_agent"),
            ],
            agents: vec![AgentCandidate::new("alpha").with_display_name("Alpha")],
            submolts: vec![SubmoltCandidate::new("agentops").with_member_count(12)],
            comments: vec![CommentCandidate::new("nice", Some("beta"), Some("p1"))],
        }
    }

    #[tokio::test]
    async fn test_full_run() {
        let store = MemoryStore::new();
        let report = Reconciler::new(&store).reconcile(&extraction(), Utc::now()).await;

        assert_eq!(report.submolts.inserted, 1);
        assert_eq!(report.agents.inserted, 3);
        assert_eq!(report.posts.inserted, 2);
        assert_eq!(report.comments.inserted, 1);
        assert!(report.failures.is_empty());

        let post = store.get_post("p1").await.unwrap().unwrap();
        let alpha = store.get_agent("alpha").await.unwrap().unwrap();
        let agentops = store.get_submolt("agentops").await.unwrap().unwrap();
        assert_eq!(post.agent_id, Some(alpha.id));
        assert_eq!(post.submolt_id, Some(agentops.id));
        assert_eq!(post.metrics.word_count, 4);
        assert_eq!(alpha.post_count, 1);

        let comment = store
            .get_comment(&extraction().comments[0].external_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comment.post_id, Some(post.id));
        let beta = store.get_agent("beta").await.unwrap().unwrap();
        assert_eq!(beta.comment_count, 1);
        assert_eq!(beta.post_count, 0);
    }

    #[tokio::test]
    async fn test_referential_completion() {
        let store = MemoryStore::new();
        let extraction = Extraction {
            posts: vec![PostCandidate::new("p9", "Hello").with_agent("newbie_agent")],
            ..Default::default()
        };
        Reconciler::new(&store).reconcile(&extraction, Utc::now()).await;

        let agent = store.get_agent("newbie_agent").await.unwrap().unwrap();
        assert_eq!(agent.post_count, 1);
        assert_eq!(store.agent_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);
        let now = Utc::now();

        reconciler.reconcile(&extraction(), now).await;
        let agents_before = store.list_agents().await.unwrap();
        let posts_before = store.list_posts().await.unwrap();

        let second = reconciler.reconcile(&extraction(), now).await;

        assert_eq!(second.posts.inserted, 0);
        assert_eq!(second.posts.updated, 2);
        assert_eq!(second.agents.inserted, 0);
        assert_eq!(store.list_agents().await.unwrap(), agents_before);
        assert_eq!(store.list_posts().await.unwrap(), posts_before);
    }

    #[tokio::test]
    async fn test_post_count_includes_earlier_cycles() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);

        let first = Extraction {
            posts: vec![PostCandidate::new("a", "Post A").with_agent("writer")],
            ..Default::default()
        };
        let second = Extraction {
            posts: vec![PostCandidate::new("b", "Post B").with_agent("writer")],
            ..Default::default()
        };
        let mention_only = Extraction {
            agents: vec![AgentCandidate::new("writer")],
            ..Default::default()
        };

        reconciler.reconcile(&first, Utc::now()).await;
        reconciler.reconcile(&second, Utc::now()).await;
        reconciler.reconcile(&mention_only, Utc::now()).await;

        let writer = store.get_agent("writer").await.unwrap().unwrap();
        assert_eq!(writer.post_count, 2);
    }

    #[tokio::test]
    async fn test_reassigned_post_recounts_previous_author() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);

        let by_alice = Extraction {
            posts: vec![PostCandidate::new("p1", "Shared post").with_agent("alice")],
            ..Default::default()
        };
        let by_bob = Extraction {
            posts: vec![PostCandidate::new("p1", "Shared post").with_agent("bob")],
            ..Default::default()
        };
        let anonymous = Extraction {
            posts: vec![PostCandidate::new("p1", "Shared post")],
            ..Default::default()
        };

        reconciler.reconcile(&by_alice, Utc::now()).await;
        reconciler.reconcile(&by_bob, Utc::now()).await;

        let alice = store.get_agent("alice").await.unwrap().unwrap();
        let bob = store.get_agent("bob").await.unwrap().unwrap();
        assert_eq!(alice.post_count, 0);
        assert_eq!(bob.post_count, 1);

        reconciler.reconcile(&anonymous, Utc::now()).await;
        let bob = store.get_agent("bob").await.unwrap().unwrap();
        assert_eq!(bob.post_count, 0);
    }

    #[tokio::test]
    async fn test_reassigned_comment_recounts_previous_author() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store);

        let first = CommentCandidate::new("same words", Some("alice"), None);
        let mut second = CommentCandidate::new("same words", Some("bob"), None);
        second.external_id = first.external_id.clone();

        let cycle = |comment: CommentCandidate| Extraction {
            comments: vec![comment],
            ..Default::default()
        };
        reconciler.reconcile(&cycle(first), Utc::now()).await;
        reconciler.reconcile(&cycle(second), Utc::now()).await;

        let alice = store.get_agent("alice").await.unwrap().unwrap();
        let bob = store.get_agent("bob").await.unwrap().unwrap();
        assert_eq!(alice.comment_count, 0);
        assert_eq!(bob.comment_count, 1);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_abort_batch() {
        let store = MemoryStore::new();
        let extraction = Extraction {
            posts: vec![
                PostCandidate::new("bad", "   "),
                PostCandidate::new("good", "Fine title"),
            ],
            agents: vec![AgentCandidate::new("")],
            ..Default::default()
        };
        let report = Reconciler::new(&store).reconcile(&extraction, Utc::now()).await;

        assert_eq!(report.posts.inserted, 1);
        assert_eq!(report.posts.failed, 1);
        assert_eq!(report.agents.failed, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(store.get_post("good").await.unwrap().is_some());
    }

    #[test]
    fn test_job_summary() {
        let report = ReconcileReport {
            posts: Tally {
                inserted: 2,
                updated: 3,
                failed: 1,
            },
            agents: Tally {
                inserted: 4,
                updated: 9,
                failed: 0,
            },
            failures: vec![WriteFailure {
                entity: "post".into(),
                key: "x".into(),
                error: "boom".into(),
            }],
            ..Default::default()
        };
        let summary = report.job_summary();
        assert_eq!(summary.posts_scraped, 5);
        assert_eq!(summary.agents_discovered, 4);
        assert_eq!(summary.write_failures, 1);
    }
}
