//! Scheduler tick.
//!
//! An externally triggered sweep that advances time-based transitions:
//! scheduled pages whose time has come are published, published pages past
//! `expires_at` are archived. Each page is handled in its own transaction,
//! re-read under a row lock and re-checked, so concurrent or repeated ticks
//! never apply a transition twice. One page failing never stops the sweep.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::content::{
    ContentError, PublishingService, TransitionContext, TransitionRequest, Trigger,
};
use crate::metrics::Metrics;
use crate::models::Page;
use crate::store::PageStore;

/// Actor recorded as `updated_by` for scheduler transitions.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

/// Outcome counts of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Scheduled pages that went live.
    pub published: u64,
    /// Expired pages that were archived.
    pub archived: u64,
    /// Due pages held back by the approval gate.
    pub awaiting_approval: u64,
    /// Pages whose transition failed for any other reason.
    pub failed: u64,
    /// Pages that no longer qualified when re-read.
    pub skipped: u64,
    pub duration_ms: u64,
}

/// The scheduler sweep.
#[derive(Clone)]
pub struct SchedulerTick {
    store: Arc<dyn PageStore>,
    publishing: PublishingService,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Clone, Copy)]
enum Sweep {
    Publish,
    Archive,
}

impl SchedulerTick {
    pub fn new(
        store: Arc<dyn PageStore>,
        publishing: PublishingService,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publishing,
            metrics,
        }
    }

    /// Run one tick at the current time.
    pub async fn run(&self) -> Result<TickSummary> {
        self.run_at(chrono::Utc::now().timestamp()).await
    }

    /// Run one tick as if the time were `now`.
    ///
    /// Fails only when the due pages can't be listed; per-page failures are
    /// counted in the summary.
    pub async fn run_at(&self, now: i64) -> Result<TickSummary> {
        let start = std::time::Instant::now();

        let mut summary = TickSummary::default();

        let due = {
            let mut tx = self.store.begin().await?;
            tx.due_scheduled(now)
                .await
                .context("failed to list due scheduled pages")?
        };
        for id in due {
            self.process(id, now, Sweep::Publish, &mut summary).await;
        }

        // Listed after the publish sweep: pages it just published may
        // already be past `expires_at`.
        let expired = {
            let mut tx = self.store.begin().await?;
            tx.due_expired(now)
                .await
                .context("failed to list expired pages")?
        };
        for id in expired {
            self.process(id, now, Sweep::Archive, &mut summary).await;
        }

        summary.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_tick(&summary);
        if summary.published + summary.archived + summary.awaiting_approval + summary.failed > 0 {
            info!(
                published = summary.published,
                archived = summary.archived,
                awaiting_approval = summary.awaiting_approval,
                failed = summary.failed,
                duration_ms = summary.duration_ms,
                "scheduler tick completed"
            );
        } else {
            debug!(skipped = summary.skipped, "scheduler tick found nothing to do");
        }
        Ok(summary)
    }

    async fn process(&self, id: Uuid, now: i64, sweep: Sweep, summary: &mut TickSummary) {
        let ctx = TransitionContext {
            trigger: Trigger::Scheduler,
            actor: SYSTEM_ACTOR,
            now,
        };
        let result = match sweep {
            Sweep::Publish => {
                self.publishing
                    .transition_if(id, TransitionRequest::Publish, ctx, move |p: &Page| {
                        p.is_due(now)
                    })
                    .await
            }
            Sweep::Archive => {
                self.publishing
                    .transition_if(id, TransitionRequest::Archive, ctx, move |p: &Page| {
                        p.is_expired(now)
                    })
                    .await
            }
        };

        match (result, sweep) {
            (Ok(Some(_)), Sweep::Publish) => summary.published += 1,
            (Ok(Some(_)), Sweep::Archive) => summary.archived += 1,
            (Ok(None), _) => summary.skipped += 1,
            (Err(e @ ContentError::ApprovalRequired(_)), _) => {
                warn!(page_id = %id, error = %e, "scheduled page is waiting for approval");
                summary.awaiting_approval += 1;
            }
            (Err(e), _) => {
                warn!(page_id = %id, error = %e, "scheduled transition failed");
                summary.failed += 1;
            }
        }
    }
}

impl std::fmt::Debug for SchedulerTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerTick")
            .field("store", &self.store.backend())
            .finish()
    }
}
