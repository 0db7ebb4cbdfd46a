use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stages::StagePlan;

/// Overall lifecycle status of an approval item.
///
/// `Pending` is the only state that accepts further actions; everything else
/// is terminal for this item instance. `RevisionRequested` is a soft reject
/// ("fix and resubmit"), distinct from a hard `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    Approved,
    Rejected,
    RevisionRequested,
    Cancelled,
}

impl OverallStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OverallStatus::Pending)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverallStatus::Pending => "pending",
            OverallStatus::Approved => "approved",
            OverallStatus::Rejected => "rejected",
            OverallStatus::RevisionRequested => "revision-requested",
            OverallStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Per-stage resolution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Approved,
    Rejected,
    Skipped,
}

/// Priority levels for submitted content.
/// Higher values = more urgent on the review queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        };
        write!(f, "{}", label)
    }
}

/// Kind of a comment entry in an item's log.
///
/// Transition-synthesized entries carry the kind matching the action that
/// produced them; free-form discussion uses `Comment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Comment,
    Approval,
    Rejection,
    Revision,
}

/// One entry in an item's append-only comment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub kind: CommentKind,
    /// Single-level threading: replies point at a top-level comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub edited: bool,
}

impl Comment {
    pub fn new(author_id: impl Into<String>, message: impl Into<String>, kind: CommentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id: author_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
            kind,
            parent_id: None,
            mentions: Vec::new(),
            edited: false,
        }
    }
}

/// Recorded result for a single configured stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage_id: String,
    pub status: StageStatus,
    pub approved_by: BTreeSet<String>,
    pub rejected_by: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// True when a `Rejected` status came from a revision request rather
    /// than a hard rejection.
    #[serde(default)]
    pub revision_requested: bool,
}

impl StageOutcome {
    pub fn pending(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            status: StageStatus::Pending,
            approved_by: BTreeSet::new(),
            rejected_by: BTreeSet::new(),
            comment: None,
            completed_at: None,
            revision_requested: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.status, StageStatus::Approved | StageStatus::Skipped)
    }
}

/// Input for submitting a new piece of content for approval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewApprovalItemInput {
    pub title: String,
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A unit of content moving through the staged approval workflow.
///
/// `overall_status` is derived from `stage_outcomes` (plus the plan's
/// required/optional flags) and is never set independently of them; see
/// [`ApprovalItem::derive_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalItem {
    pub id: Uuid,
    pub title: String,
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// First pending stage, or `None` once the item is resolved. Frozen at
    /// the rejecting stage for rejected / revision-requested items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage_id: Option<String>,
    pub overall_status: OverallStatus,
    /// Exactly one outcome per configured stage, in plan order.
    pub stage_outcomes: Vec<StageOutcome>,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl ApprovalItem {
    pub fn outcome(&self, stage_id: &str) -> Option<&StageOutcome> {
        self.stage_outcomes.iter().find(|o| o.stage_id == stage_id)
    }

    /// Recompute the overall status purely from the stage outcomes and the
    /// plan. The stored `overall_status` must always equal this.
    pub fn derive_status(&self, plan: &StagePlan) -> OverallStatus {
        if let Some(rejected) = self
            .stage_outcomes
            .iter()
            .find(|o| o.status == StageStatus::Rejected)
        {
            return if rejected.revision_requested {
                OverallStatus::RevisionRequested
            } else {
                OverallStatus::Rejected
            };
        }
        if self
            .stage_outcomes
            .iter()
            .any(|o| o.status == StageStatus::Pending)
        {
            return OverallStatus::Pending;
        }
        // All outcomes approved or skipped. A skipped *required* stage can
        // only come from cancellation; optional stages skip on advance.
        let required_skipped = self.stage_outcomes.iter().any(|o| {
            o.status == StageStatus::Skipped
                && plan.stage(&o.stage_id).is_some_and(|s| !s.optional)
        });
        if required_skipped {
            OverallStatus::Cancelled
        } else {
            OverallStatus::Approved
        }
    }
}
