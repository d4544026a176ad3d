use tracing::debug;
use uuid::Uuid;

use super::{ReconcileContext, Reconciler};
use crate::traits::store::ArchiveStore;
use crate::types::{candidate::SubmoltCandidate, record::SubmoltUpsert};

impl<'a, S: ArchiveStore> Reconciler<'a, S> {
    pub(super) async fn reconcile_submolts(
        &self,
        ctx: &mut ReconcileContext,
        candidates: &[SubmoltCandidate],
    ) {
        for candidate in candidates {
            let upsert = SubmoltUpsert {
                name: candidate.name.clone(),
                member_count: candidate.member_count,
                description: candidate.description.clone(),
                seen_at: ctx.now,
            };
            self.write_submolt(ctx, &upsert).await;
        }
    }

    /// Resolve a submolt name to an id, creating a bare row on first sight.
    pub(super) async fn ensure_submolt(
        &self,
        ctx: &mut ReconcileContext,
        name: &str,
    ) -> Option<Uuid> {
        if let Some(id) = ctx.submolt_id(name) {
            return Some(id);
        }

        let upsert = SubmoltUpsert {
            name: name.to_string(),
            member_count: None,
            description: None,
            seen_at: ctx.now,
        };
        self.write_submolt(ctx, &upsert).await
    }

    async fn write_submolt(&self, ctx: &mut ReconcileContext, upsert: &SubmoltUpsert) -> Option<Uuid> {
        match self.store.upsert_submolt(upsert).await {
            Ok(upserted) => {
                debug!(name = %upsert.name, inserted = upserted.is_insert(), "Submolt reconciled");
                ctx.report.submolts.record(&upserted);
                ctx.submolt_ids.insert(upsert.name.clone(), upserted.id);
                Some(upserted.id)
            }
            Err(e) => {
                ctx.report.submolts.failed += 1;
                ctx.fail("submolt", &upsert.name, &e);
                None
            }
        }
    }
}
