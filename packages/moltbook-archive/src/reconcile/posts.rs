use tracing::{debug, warn};

use super::{ReconcileContext, Reconciler};
use crate::metrics::TextMetrics;
use crate::traits::store::ArchiveStore;
use crate::types::{candidate::PostCandidate, record::PostUpsert};

impl<'a, S: ArchiveStore> Reconciler<'a, S> {
    /// Upsert posts, resolving authors and communities first.
    ///
    /// A reference that cannot be resolved leaves the foreign key empty
    /// rather than dropping the post.
    pub(super) async fn reconcile_posts(
        &self,
        ctx: &mut ReconcileContext,
        candidates: &[PostCandidate],
    ) {
        for candidate in candidates {
            let agent_id = match candidate.agent_reference.as_deref() {
                Some(username) => self.ensure_agent(ctx, username).await,
                None => None,
            };
            let submolt_id = match candidate.submolt_reference.as_deref() {
                Some(name) => self.ensure_submolt(ctx, name).await,
                None => None,
            };

            let upsert = PostUpsert {
                external_id: candidate.external_id.clone(),
                title: candidate.title.clone(),
                content: candidate.content.clone(),
                url: candidate.url.clone(),
                upvotes: candidate.upvotes,
                downvotes: candidate.downvotes,
                comment_count: candidate.comment_count,
                posted_at: candidate.posted_at,
                agent_id,
                submolt_id,
                metrics: TextMetrics::for_post(&candidate.title, candidate.content.as_deref()),
                scraped_at: ctx.now,
            };

            // A re-scrape may move the post to another author; the old one
            // needs its count refreshed too.
            match self.store.get_post(&upsert.external_id).await {
                Ok(Some(previous)) => {
                    if let Some(previous_agent) = previous.agent_id {
                        ctx.touched_agents.insert(previous_agent);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(external_id = %upsert.external_id, error = %e, "Previous post lookup failed"),
            }

            match self.store.upsert_post(&upsert).await {
                Ok(upserted) => {
                    debug!(
                        external_id = %upsert.external_id,
                        inserted = upserted.is_insert(),
                        "Post reconciled"
                    );
                    ctx.report.posts.record(&upserted);
                    ctx.post_ids.insert(upsert.external_id.clone(), upserted.id);
                }
                Err(e) => {
                    ctx.report.posts.failed += 1;
                    ctx.fail("post", &upsert.external_id, &e);
                }
            }
        }
    }
}
