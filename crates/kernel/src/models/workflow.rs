//! Publishing workflow model.
//!
//! One optional row per page recording whether publishing requires approval
//! and where the approval currently stands.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approval state of a page's workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Approval not in use.
    None,
    /// Waiting for a reviewer.
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Return the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(anyhow::anyhow!(
                "invalid approval status: {s:?} (expected none, pending, approved, or rejected)"
            )),
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishing workflow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingWorkflow {
    /// Page this workflow belongs to (one-to-one).
    pub page_id: Uuid,

    /// Whether publishing requires an approved review.
    pub requires_approval: bool,

    pub approval_status: ApprovalStatus,

    /// Who last asked for review.
    pub requested_by: Option<Uuid>,
    pub requested_at: Option<i64>,

    pub approved_by: Option<Uuid>,
    pub approved_at: Option<i64>,

    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<i64>,

    /// Always non-empty when `approval_status` is `rejected`.
    pub rejection_reason: Option<String>,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Row type for reading PublishingWorkflow from the database.
#[derive(sqlx::FromRow)]
pub(crate) struct PublishingWorkflowRow {
    pub page_id: Uuid,
    pub requires_approval: bool,
    pub approval_status: String,
    pub requested_by: Option<Uuid>,
    pub requested_at: Option<i64>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<i64>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<i64>,
    pub rejection_reason: Option<String>,
    pub changed: i64,
}

impl TryFrom<PublishingWorkflowRow> for PublishingWorkflow {
    type Error = anyhow::Error;

    fn try_from(row: PublishingWorkflowRow) -> anyhow::Result<Self> {
        Ok(Self {
            page_id: row.page_id,
            requires_approval: row.requires_approval,
            approval_status: row.approval_status.parse()?,
            requested_by: row.requested_by,
            requested_at: row.requested_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            changed: row.changed,
        })
    }
}

impl PublishingWorkflow {
    /// A fresh workflow row with no approval in play.
    pub fn new(page_id: Uuid, now: i64) -> Self {
        Self {
            page_id,
            requires_approval: false,
            approval_status: ApprovalStatus::None,
            requested_by: None,
            requested_at: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            changed: now,
        }
    }

    /// Clear any previous review decision.
    pub fn clear_decision(&mut self) {
        self.approved_by = None;
        self.approved_at = None;
        self.rejected_by = None;
        self.rejected_at = None;
        self.rejection_reason = None;
    }

    /// Whether this workflow currently permits publishing.
    pub fn permits_publish(&self) -> bool {
        !self.requires_approval || self.approval_status == ApprovalStatus::Approved
    }
}

/// A pending review joined with its page, for operator listings.
#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    pub page_id: Uuid,
    pub title: String,
    pub slug: String,
    pub page_status: super::PageStatus,
    pub scheduled_for: Option<i64>,
    pub requested_by: Option<Uuid>,
    pub requested_at: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn approval_status_round_trips_through_str() {
        for status in [
            ApprovalStatus::None,
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ApprovalStatus>().unwrap(), status);
        }
        assert!("maybe".parse::<ApprovalStatus>().is_err());
    }

    #[test]
    fn permits_publish() {
        let mut wf = PublishingWorkflow::new(Uuid::now_v7(), 0);
        assert!(wf.permits_publish());

        wf.requires_approval = true;
        wf.approval_status = ApprovalStatus::Pending;
        assert!(!wf.permits_publish());

        wf.approval_status = ApprovalStatus::Rejected;
        assert!(!wf.permits_publish());

        wf.approval_status = ApprovalStatus::Approved;
        assert!(wf.permits_publish());
    }
}
