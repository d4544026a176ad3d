use tracing::{debug, warn};
use uuid::Uuid;

use super::{ReconcileContext, Reconciler};
use crate::metrics::TextMetrics;
use crate::traits::store::ArchiveStore;
use crate::types::{candidate::CommentCandidate, record::CommentUpsert};

impl<'a, S: ArchiveStore> Reconciler<'a, S> {
    pub(super) async fn reconcile_comments(
        &self,
        ctx: &mut ReconcileContext,
        candidates: &[CommentCandidate],
    ) {
        for candidate in candidates {
            let post_id = match candidate.post_reference.as_deref() {
                Some(external_id) => self.resolve_post(ctx, external_id).await,
                None => None,
            };
            let agent_id = match candidate.agent_reference.as_deref() {
                Some(username) => self.ensure_agent(ctx, username).await,
                None => None,
            };

            let upsert = CommentUpsert {
                external_id: candidate.external_id.clone(),
                content: candidate.content.clone(),
                agent_id,
                post_id,
                upvotes: candidate.upvotes,
                posted_at: candidate.posted_at,
                metrics: TextMetrics::compute(&candidate.content),
                scraped_at: ctx.now,
            };

            match self.store.get_comment(&upsert.external_id).await {
                Ok(Some(previous)) => {
                    if let Some(previous_agent) = previous.agent_id {
                        ctx.touched_agents.insert(previous_agent);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(external_id = %upsert.external_id, error = %e, "Previous comment lookup failed")
                }
            }

            match self.store.upsert_comment(&upsert).await {
                Ok(upserted) => {
                    debug!(
                        external_id = %upsert.external_id,
                        inserted = upserted.is_insert(),
                        "Comment reconciled"
                    );
                    ctx.report.comments.record(&upserted);
                }
                Err(e) => {
                    ctx.report.comments.failed += 1;
                    ctx.fail("comment", &upsert.external_id, &e);
                }
            }
        }
    }

    /// Parent posts usually come from the same cycle; fall back to storage
    /// for comments on posts archived earlier.
    async fn resolve_post(&self, ctx: &mut ReconcileContext, external_id: &str) -> Option<Uuid> {
        if let Some(id) = ctx.post_id(external_id) {
            return Some(id);
        }

        match self.store.get_post(external_id).await {
            Ok(Some(post)) => {
                ctx.post_ids.insert(external_id.to_string(), post.id);
                Some(post.id)
            }
            Ok(None) => {
                debug!(external_id, "Parent post not archived, comment left detached");
                None
            }
            Err(e) => {
                warn!(external_id, error = %e, "Parent post lookup failed");
                None
            }
        }
    }
}
