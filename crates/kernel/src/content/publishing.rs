//! Publishing service.
//!
//! Lifecycle actions and the approval workflow. Each operation is one
//! transaction: the page row is locked first, then the workflow row is read
//! and written under that lock, so approval and publishing can't interleave.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{ContentError, ContentResult};
use super::lifecycle::{Lifecycle, Transition, TransitionContext, TransitionRequest, Trigger};
use super::page_service::{now, require_locked, require_page};
use crate::metrics::Metrics;
use crate::models::{
    ApprovalStatus, Page, PageFilter, PageStatus, PendingApproval, PublishingWorkflow,
};
use crate::store::{PageStore, PageTx};

/// Result of an approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub workflow: PublishingWorkflow,
    pub page: Page,
    /// Whether the approval also published the page.
    pub published: bool,
}

/// A scheduled page whose time has passed without it going live.
#[derive(Debug, Clone, Serialize)]
pub struct OverduePage {
    pub page: Page,
    /// Seconds since `scheduled_for`.
    pub overdue_by: i64,
    /// Approval state, when the page has a workflow row.
    pub approval_status: Option<ApprovalStatus>,
}

/// Service for lifecycle transitions and approvals.
#[derive(Clone)]
pub struct PublishingService {
    inner: Arc<PublishingServiceInner>,
}

struct PublishingServiceInner {
    store: Arc<dyn PageStore>,
    lifecycle: Lifecycle,
    metrics: Arc<Metrics>,
}

impl PublishingService {
    pub fn new(store: Arc<dyn PageStore>, lifecycle: Lifecycle, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::new(PublishingServiceInner {
                store,
                lifecycle,
                metrics,
            }),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub async fn publish(&self, id: Uuid, actor: Uuid) -> ContentResult<Page> {
        self.transition(id, TransitionRequest::Publish, actor).await
    }

    pub async fn unpublish(&self, id: Uuid, actor: Uuid) -> ContentResult<Page> {
        self.transition(id, TransitionRequest::Unpublish, actor)
            .await
    }

    /// Schedule a draft to go live at `scheduled_for`.
    pub async fn schedule(
        &self,
        id: Uuid,
        scheduled_for: i64,
        expires_at: Option<i64>,
        actor: Uuid,
    ) -> ContentResult<Page> {
        let request = TransitionRequest::Schedule {
            scheduled_for,
            expires_at,
        };
        self.transition(id, request, actor).await
    }

    pub async fn cancel_schedule(&self, id: Uuid, actor: Uuid) -> ContentResult<Page> {
        self.transition(id, TransitionRequest::CancelSchedule, actor)
            .await
    }

    pub async fn archive(&self, id: Uuid, actor: Uuid) -> ContentResult<Page> {
        self.transition(id, TransitionRequest::Archive, actor).await
    }

    /// Apply a manual transition.
    pub async fn transition(
        &self,
        id: Uuid,
        request: TransitionRequest,
        actor: Uuid,
    ) -> ContentResult<Page> {
        let ctx = TransitionContext {
            trigger: Trigger::Manual,
            actor,
            now: now(),
        };
        let mut tx = self.inner.store.begin().await?;
        let page = require_locked(tx.as_mut(), id).await?;
        let transition = self
            .inner
            .lifecycle
            .attempt_transition(tx.as_mut(), page, request, ctx)
            .await?;
        tx.commit().await?;

        self.finish(&transition);
        Ok(transition.page)
    }

    /// Apply a transition if the page, re-read under lock, still qualifies.
    ///
    /// Returns `None` when the page is gone or `qualifies` rejects it.
    pub async fn transition_if<F>(
        &self,
        id: Uuid,
        request: TransitionRequest,
        ctx: TransitionContext,
        qualifies: F,
    ) -> ContentResult<Option<Transition>>
    where
        F: Fn(&Page) -> bool + Send,
    {
        let mut tx = self.inner.store.begin().await?;
        let Some(page) = tx.lock_page(id).await? else {
            return Ok(None);
        };
        if !qualifies(&page) {
            debug!(page_id = %id, status = %page.status, "page no longer qualifies");
            return Ok(None);
        }
        let transition = self
            .inner
            .lifecycle
            .attempt_transition(tx.as_mut(), page, request, ctx)
            .await?;
        tx.commit().await?;

        self.finish(&transition);
        Ok(Some(transition))
    }

    /// Workflow row of a page, or the view implied by the default policy.
    pub async fn get_workflow(&self, id: Uuid) -> ContentResult<PublishingWorkflow> {
        let mut tx = self.inner.store.begin().await?;
        let page = require_page(tx.as_mut(), id).await?;
        match tx.workflow(id).await? {
            Some(wf) => Ok(wf),
            None => {
                let mut wf = PublishingWorkflow::new(id, page.changed);
                wf.requires_approval = self.inner.lifecycle.policy().require_by_default;
                Ok(wf)
            }
        }
    }

    /// Turn the approval requirement on or off.
    ///
    /// Enabling moves a workflow without a decision to `pending`; an existing
    /// decision is kept. Disabling resets the workflow to `none`.
    pub async fn upsert_workflow(
        &self,
        id: Uuid,
        requires_approval: bool,
        actor: Uuid,
    ) -> ContentResult<PublishingWorkflow> {
        let now = now();
        let mut tx = self.inner.store.begin().await?;
        require_locked(tx.as_mut(), id).await?;
        let mut wf = tx
            .workflow(id)
            .await?
            .unwrap_or_else(|| PublishingWorkflow::new(id, now));

        wf.requires_approval = requires_approval;
        if requires_approval {
            if wf.approval_status == ApprovalStatus::None {
                wf.approval_status = ApprovalStatus::Pending;
                wf.requested_by = Some(actor);
                wf.requested_at = Some(now);
            }
        } else {
            wf.approval_status = ApprovalStatus::None;
            wf.requested_by = None;
            wf.requested_at = None;
            wf.clear_decision();
        }
        wf.changed = now;
        tx.save_workflow(&wf).await?;
        tx.commit().await?;

        info!(
            page_id = %id,
            requires_approval,
            status = %wf.approval_status,
            "workflow updated"
        );
        Ok(wf)
    }

    /// Submit (or resubmit) a page for review.
    pub async fn request_approval(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> ContentResult<PublishingWorkflow> {
        let now = now();
        let mut tx = self.inner.store.begin().await?;
        require_locked(tx.as_mut(), id).await?;
        let mut wf = tx
            .workflow(id)
            .await?
            .unwrap_or_else(|| PublishingWorkflow::new(id, now));

        wf.requires_approval = true;
        wf.approval_status = ApprovalStatus::Pending;
        wf.requested_by = Some(actor);
        wf.requested_at = Some(now);
        wf.clear_decision();
        wf.changed = now;
        tx.save_workflow(&wf).await?;
        tx.commit().await?;

        info!(page_id = %id, requested_by = %actor, "approval requested");
        Ok(wf)
    }

    /// Approve a pending page.
    ///
    /// A draft or scheduled page is published in the same transaction; if
    /// that fails the approval is not recorded either.
    pub async fn approve(&self, id: Uuid, approver: Uuid) -> ContentResult<ApprovalOutcome> {
        let now = now();
        let mut tx = self.inner.store.begin().await?;
        let page = require_locked(tx.as_mut(), id).await?;
        let mut wf = pending_workflow(tx.as_mut(), id).await?;

        wf.approval_status = ApprovalStatus::Approved;
        wf.clear_decision();
        wf.approved_by = Some(approver);
        wf.approved_at = Some(now);
        wf.changed = now;
        tx.save_workflow(&wf).await?;

        let transition = if matches!(page.status, PageStatus::Draft | PageStatus::Scheduled) {
            let ctx = TransitionContext {
                trigger: Trigger::Approval,
                actor: approver,
                now,
            };
            Some(
                self.inner
                    .lifecycle
                    .attempt_transition(tx.as_mut(), page.clone(), TransitionRequest::Publish, ctx)
                    .await?,
            )
        } else {
            None
        };
        tx.commit().await?;

        info!(page_id = %id, approved_by = %approver, "page approved");
        let published = transition.is_some();
        let page = match transition {
            Some(t) => {
                self.finish(&t);
                t.page
            }
            None => page,
        };
        Ok(ApprovalOutcome {
            workflow: wf,
            page,
            published,
        })
    }

    /// Reject a pending page. The page status is left alone.
    pub async fn reject(
        &self,
        id: Uuid,
        approver: Uuid,
        reason: &str,
    ) -> ContentResult<PublishingWorkflow> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ContentError::invalid("a rejection needs a reason"));
        }

        let now = now();
        let mut tx = self.inner.store.begin().await?;
        require_locked(tx.as_mut(), id).await?;
        let mut wf = pending_workflow(tx.as_mut(), id).await?;

        wf.approval_status = ApprovalStatus::Rejected;
        wf.clear_decision();
        wf.rejected_by = Some(approver);
        wf.rejected_at = Some(now);
        wf.rejection_reason = Some(reason.to_string());
        wf.changed = now;
        tx.save_workflow(&wf).await?;
        tx.commit().await?;

        info!(page_id = %id, rejected_by = %approver, "page rejected");
        Ok(wf)
    }

    /// Workflows waiting for a reviewer, oldest request first.
    pub async fn list_pending_approvals(&self) -> ContentResult<Vec<PendingApproval>> {
        let mut tx = self.inner.store.begin().await?;
        Ok(tx.pending_approvals().await?)
    }

    pub async fn list_scheduled(&self, limit: i64, offset: i64) -> ContentResult<Vec<Page>> {
        let mut tx = self.inner.store.begin().await?;
        let filter = PageFilter {
            status: Some(PageStatus::Scheduled),
            parent_id: None,
            limit: Some(limit),
            offset: Some(offset),
        };
        Ok(tx.list_pages(&filter).await?)
    }

    /// Scheduled pages past their time, usually held back by approval.
    pub async fn list_overdue_scheduled(&self, now: i64) -> ContentResult<Vec<OverduePage>> {
        let mut tx = self.inner.store.begin().await?;
        let mut overdue = Vec::new();
        for id in tx.due_scheduled(now).await? {
            let Some(page) = tx.page(id).await? else {
                continue;
            };
            let approval_status = tx.workflow(id).await?.map(|wf| wf.approval_status);
            overdue.push(OverduePage {
                overdue_by: now - page.scheduled_for.unwrap_or(now),
                page,
                approval_status,
            });
        }
        Ok(overdue)
    }

    fn finish(&self, transition: &Transition) {
        self.inner
            .metrics
            .record_transition(transition.to(), transition.trigger);
        info!(
            page_id = %transition.page.id,
            from = %transition.from,
            to = %transition.to(),
            trigger = %transition.trigger,
            "page status changed"
        );
    }
}

impl std::fmt::Debug for PublishingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishingService")
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}

/// The page's workflow, which must be waiting for review.
async fn pending_workflow(tx: &mut dyn PageTx, id: Uuid) -> ContentResult<PublishingWorkflow> {
    match tx.workflow(id).await? {
        Some(wf) if wf.approval_status == ApprovalStatus::Pending => Ok(wf),
        Some(wf) => Err(ContentError::invalid(format!(
            "page {id} is not awaiting approval (status {})",
            wf.approval_status
        ))),
        None => Err(ContentError::invalid(format!(
            "page {id} has no approval request"
        ))),
    }
}
