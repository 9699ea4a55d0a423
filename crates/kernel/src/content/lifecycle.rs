//! Page lifecycle controller.
//!
//! [`Lifecycle::attempt_transition`] is the only code that changes a page's
//! status. Manual actions, the scheduler tick and approvals all go through
//! it; the [`Trigger`] only changes which time guards apply and how the
//! transition is logged.
//!
//! ```text
//! draft ──publish──────────────► published ──unpublish──► draft
//!   │                                ▲  │
//!   └─schedule─► scheduled ─publish──┘  └─archive / expiry─► archived
//!                   │
//!                   └─cancel schedule─► draft
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ContentError, ContentResult};
use crate::models::{ApprovalStatus, Page, PageStatus};
use crate::store::PageTx;

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// A user action through the API.
    Manual,
    /// The scheduler tick.
    Scheduler,
    /// A successful approval.
    Approval,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduler => "scheduler",
            Self::Approval => "approval",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionRequest {
    Publish,
    Schedule {
        scheduled_for: i64,
        #[serde(default)]
        expires_at: Option<i64>,
    },
    Unpublish,
    CancelSchedule,
    Archive,
}

impl TransitionRequest {
    /// Status the page ends up in.
    pub fn target(&self) -> PageStatus {
        match self {
            Self::Publish => PageStatus::Published,
            Self::Schedule { .. } => PageStatus::Scheduled,
            Self::Unpublish | Self::CancelSchedule => PageStatus::Draft,
            Self::Archive => PageStatus::Archived,
        }
    }
}

/// Who and when, for a transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub trigger: Trigger,
    pub actor: Uuid,
    pub now: i64,
}

/// Applied transition, returned so callers can log and count it after commit.
#[derive(Debug, Clone)]
pub struct Transition {
    pub page: Page,
    pub from: PageStatus,
    pub trigger: Trigger,
}

impl Transition {
    pub fn to(&self) -> PageStatus {
        self.page.status
    }
}

/// How pages without a workflow row are treated by the approval guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// Require an approved workflow even when none exists.
    pub require_by_default: bool,
}

/// The transition authority.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle {
    policy: ApprovalPolicy,
}

impl Lifecycle {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    /// Validate and apply `request` to `page` inside `tx`.
    ///
    /// `page` must have been read with [`PageTx::lock_page`] in the same
    /// transaction. On error nothing has been written.
    pub async fn attempt_transition(
        &self,
        tx: &mut dyn PageTx,
        page: Page,
        request: TransitionRequest,
        ctx: TransitionContext,
    ) -> ContentResult<Transition> {
        let from = page.status;
        let to = request.target();
        let refuse = |reason: String| ContentError::InvalidTransition { from, to, reason };

        let mut next = page;
        match (from, request) {
            (PageStatus::Draft, TransitionRequest::Publish) => {
                if ctx.trigger == Trigger::Scheduler {
                    return Err(refuse("the scheduler only publishes scheduled pages".into()));
                }
            }
            (PageStatus::Scheduled, TransitionRequest::Publish) => {
                let due = next.scheduled_for.is_some_and(|at| at <= ctx.now);
                if ctx.trigger != Trigger::Approval && !due {
                    return Err(refuse(format!(
                        "scheduled time {} has not been reached",
                        next.scheduled_for.unwrap_or_default()
                    )));
                }
            }
            (
                PageStatus::Draft,
                TransitionRequest::Schedule {
                    scheduled_for,
                    expires_at,
                },
            ) => {
                if ctx.trigger != Trigger::Manual {
                    return Err(refuse("scheduling is a manual action".into()));
                }
                if scheduled_for <= ctx.now {
                    return Err(refuse(format!(
                        "scheduled_for {scheduled_for} must be in the future"
                    )));
                }
                let expires_at = expires_at.or(next.expires_at);
                if expires_at.is_some_and(|exp| exp <= scheduled_for) {
                    return Err(refuse(format!(
                        "expires_at must be after scheduled_for {scheduled_for}"
                    )));
                }
                next.scheduled_for = Some(scheduled_for);
                next.expires_at = expires_at;
            }
            (PageStatus::Published, TransitionRequest::Unpublish) => {}
            (PageStatus::Scheduled, TransitionRequest::CancelSchedule) => {
                next.scheduled_for = None;
            }
            (PageStatus::Published, TransitionRequest::Archive) => {
                if ctx.trigger == Trigger::Scheduler
                    && !next.expires_at.is_some_and(|at| at <= ctx.now)
                {
                    return Err(refuse("page has not expired".into()));
                }
            }
            _ => return Err(refuse("no such transition".into())),
        }

        if to == PageStatus::Published {
            self.check_approval(tx, &next).await?;
            if let Some(owner) = tx.published_slug_owner(&next.slug, next.id).await? {
                return Err(ContentError::conflict(format!(
                    "slug {:?} is already used by published page {owner}",
                    next.slug
                )));
            }
            next.published_at = Some(ctx.now);
            next.scheduled_for = None;
        }

        next.status = to;
        next.updated_by = ctx.actor;
        next.changed = ctx.now;
        tx.update_page(&next).await?;

        Ok(Transition {
            page: next,
            from,
            trigger: ctx.trigger,
        })
    }

    /// The approval guard for entering `published`.
    pub async fn check_approval(&self, tx: &mut dyn PageTx, page: &Page) -> ContentResult<()> {
        match tx.workflow(page.id).await? {
            Some(wf) if wf.requires_approval => {
                if wf.approval_status == ApprovalStatus::Approved {
                    Ok(())
                } else {
                    Err(ContentError::ApprovalRequired(format!(
                        "page {} requires approval and its workflow is {}",
                        page.id, wf.approval_status
                    )))
                }
            }
            Some(_) => Ok(()),
            None if self.policy.require_by_default => Err(ContentError::ApprovalRequired(
                format!("page {} has no approved workflow", page.id),
            )),
            None => Ok(()),
        }
    }
}
