use tracing::debug;
use uuid::Uuid;

use super::{ReconcileContext, Reconciler};
use crate::traits::store::ArchiveStore;
use crate::types::{candidate::AgentCandidate, record::AgentUpsert};

impl<'a, S: ArchiveStore> Reconciler<'a, S> {
    pub(super) async fn reconcile_agents(
        &self,
        ctx: &mut ReconcileContext,
        candidates: &[AgentCandidate],
    ) {
        for candidate in candidates {
            let upsert = AgentUpsert {
                username: candidate.username.clone(),
                display_name: candidate.display_name.clone(),
                seen_at: ctx.now,
            };
            self.write_agent(ctx, &upsert).await;
        }
    }

    /// Resolve a username to an id. An agent referenced by a post or
    /// comment but never listed on its own still gets a row.
    pub(super) async fn ensure_agent(
        &self,
        ctx: &mut ReconcileContext,
        username: &str,
    ) -> Option<Uuid> {
        if let Some(id) = ctx.agent_id(username) {
            return Some(id);
        }

        let upsert = AgentUpsert {
            username: username.to_string(),
            display_name: None,
            seen_at: ctx.now,
        };
        self.write_agent(ctx, &upsert).await
    }

    async fn write_agent(&self, ctx: &mut ReconcileContext, upsert: &AgentUpsert) -> Option<Uuid> {
        match self.store.upsert_agent(upsert).await {
            Ok(upserted) => {
                debug!(username = %upsert.username, inserted = upserted.is_insert(), "Agent reconciled");
                ctx.report.agents.record(&upserted);
                ctx.agent_ids.insert(upsert.username.clone(), upserted.id);
                ctx.touched_agents.insert(upserted.id);
                Some(upserted.id)
            }
            Err(e) => {
                ctx.report.agents.failed += 1;
                ctx.fail("agent", &upsert.username, &e);
                None
            }
        }
    }
}
