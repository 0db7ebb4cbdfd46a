use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stages::{ApprovalStage, StagePlan};
use super::types::{
    ApprovalItem, Comment, CommentKind, OverallStatus, StageStatus,
};

/// Actions a reviewer (or the submitter, for `Cancel`) can take on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve {
        stage_id: String,
        actor_id: String,
        comment: Option<String>,
    },
    Reject {
        stage_id: String,
        actor_id: String,
        comment: String,
    },
    RequestRevision {
        stage_id: String,
        actor_id: String,
        comment: String,
    },
    Cancel {
        actor_id: String,
    },
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("item is {status} and accepts no further actions")]
    InvalidState { status: OverallStatus },
    #[error("stage {stage_id} is no longer current (current: {current:?})")]
    StaleStage {
        stage_id: String,
        current: Option<String>,
    },
    #[error("stage {stage_id} is not part of the configured plan")]
    UnknownStage { stage_id: String },
    #[error("{actor_id} is not an approver for stage {stage_id}")]
    NotAnApprover { actor_id: String, stage_id: String },
    #[error("validation failed: {reason}")]
    Validation { reason: String },
}

/// Apply an action to an item, producing the next item state.
///
/// Pure with respect to its inputs: the incoming item is never mutated, and
/// a returned error means the caller's copy is exactly what it was. The
/// synthesized comment for the action is appended as part of the same
/// computed state, so histories cannot drift from outcomes.
pub fn apply_action(
    plan: &StagePlan,
    item: &ApprovalItem,
    action: ApprovalAction,
) -> Result<ApprovalItem, TransitionError> {
    match action {
        ApprovalAction::Approve {
            stage_id,
            actor_id,
            comment,
        } => apply_approve(plan, item, &stage_id, &actor_id, comment),
        ApprovalAction::Reject {
            stage_id,
            actor_id,
            comment,
        } => apply_rejection(plan, item, &stage_id, &actor_id, comment, false),
        ApprovalAction::RequestRevision {
            stage_id,
            actor_id,
            comment,
        } => apply_rejection(plan, item, &stage_id, &actor_id, comment, true),
        ApprovalAction::Cancel { actor_id } => apply_cancel(item, &actor_id),
    }
}

/// Common guards for stage-targeted actions. Returns the stage and the
/// index of the targeted outcome on success.
fn check_stage_action<'a>(
    plan: &'a StagePlan,
    item: &ApprovalItem,
    stage_id: &str,
    actor_id: &str,
) -> Result<(&'a ApprovalStage, usize), TransitionError> {
    if item.overall_status.is_terminal() {
        return Err(TransitionError::InvalidState {
            status: item.overall_status,
        });
    }
    if item.current_stage_id.as_deref() != Some(stage_id) {
        return Err(TransitionError::StaleStage {
            stage_id: stage_id.to_string(),
            current: item.current_stage_id.clone(),
        });
    }
    let stage = plan
        .stage(stage_id)
        .ok_or_else(|| TransitionError::UnknownStage {
            stage_id: stage_id.to_string(),
        })?;
    if !stage.has_approver(actor_id) {
        return Err(TransitionError::NotAnApprover {
            actor_id: actor_id.to_string(),
            stage_id: stage_id.to_string(),
        });
    }
    let idx = item
        .stage_outcomes
        .iter()
        .position(|o| o.stage_id == stage_id)
        .ok_or_else(|| TransitionError::UnknownStage {
            stage_id: stage_id.to_string(),
        })?;
    Ok((stage, idx))
}

fn apply_approve(
    plan: &StagePlan,
    item: &ApprovalItem,
    stage_id: &str,
    actor_id: &str,
    comment: Option<String>,
) -> Result<ApprovalItem, TransitionError> {
    let (stage, idx) = check_stage_action(plan, item, stage_id, actor_id)?;

    let mut next = item.clone();
    let outcome = &mut next.stage_outcomes[idx];
    if !outcome.approved_by.insert(actor_id.to_string()) {
        // Approver set, not a counter: re-approval changes nothing.
        tracing::debug!(
            item_id = %item.id,
            stage_id = %stage_id,
            actor_id = %actor_id,
            "duplicate approval ignored"
        );
        return Ok(next);
    }

    let quorum_met = outcome.approved_by.len() >= stage.min_approvals as usize;
    let message = comment
        .clone()
        .unwrap_or_else(|| format!("Approved stage {}", stage.name));
    next.comments
        .push(Comment::new(actor_id, message, CommentKind::Approval));

    if quorum_met {
        let now = Utc::now();
        let outcome = &mut next.stage_outcomes[idx];
        outcome.status = StageStatus::Approved;
        outcome.completed_at = Some(now);
        if comment.is_some() {
            outcome.comment = comment;
        }

        // Advance past any optional stages to the next required one.
        match plan.next_required_index_from(idx + 1) {
            Some(next_pos) => {
                for skipped in &mut next.stage_outcomes[idx + 1..next_pos] {
                    skipped.status = StageStatus::Skipped;
                    skipped.completed_at = Some(now);
                }
                next.current_stage_id = Some(plan.ordered_stages()[next_pos].id.clone());
            }
            None => {
                for skipped in &mut next.stage_outcomes[idx + 1..] {
                    skipped.status = StageStatus::Skipped;
                    skipped.completed_at = Some(now);
                }
                next.current_stage_id = None;
                next.overall_status = OverallStatus::Approved;
            }
        }
        tracing::info!(
            item_id = %next.id,
            stage_id = %stage_id,
            actor_id = %actor_id,
            overall_status = %next.overall_status,
            "stage approved"
        );
    } else {
        tracing::info!(
            item_id = %next.id,
            stage_id = %stage_id,
            actor_id = %actor_id,
            approvals = next.stage_outcomes[idx].approved_by.len(),
            quorum = stage.min_approvals,
            "approval recorded, quorum not yet met"
        );
    }
    Ok(next)
}

fn apply_rejection(
    plan: &StagePlan,
    item: &ApprovalItem,
    stage_id: &str,
    actor_id: &str,
    comment: String,
    revision: bool,
) -> Result<ApprovalItem, TransitionError> {
    let (_stage, idx) = check_stage_action(plan, item, stage_id, actor_id)?;
    if comment.trim().is_empty() {
        return Err(TransitionError::Validation {
            reason: "a rejection requires a comment".to_string(),
        });
    }

    let mut next = item.clone();
    let outcome = &mut next.stage_outcomes[idx];
    outcome.status = StageStatus::Rejected;
    outcome.revision_requested = revision;
    outcome.rejected_by.insert(actor_id.to_string());
    outcome.comment = Some(comment.clone());
    outcome.completed_at = Some(Utc::now());

    // The cursor freezes at the rejecting stage; later stages never run.
    next.overall_status = if revision {
        OverallStatus::RevisionRequested
    } else {
        OverallStatus::Rejected
    };
    let kind = if revision {
        CommentKind::Revision
    } else {
        CommentKind::Rejection
    };
    next.comments.push(Comment::new(actor_id, comment, kind));

    tracing::info!(
        item_id = %next.id,
        stage_id = %stage_id,
        actor_id = %actor_id,
        overall_status = %next.overall_status,
        "stage rejected"
    );
    Ok(next)
}

fn apply_cancel(item: &ApprovalItem, actor_id: &str) -> Result<ApprovalItem, TransitionError> {
    if !matches!(
        item.overall_status,
        OverallStatus::Pending | OverallStatus::RevisionRequested
    ) {
        return Err(TransitionError::InvalidState {
            status: item.overall_status,
        });
    }

    let now = Utc::now();
    let mut next = item.clone();
    for outcome in &mut next.stage_outcomes {
        if outcome.status != StageStatus::Approved {
            outcome.status = StageStatus::Skipped;
            outcome.completed_at.get_or_insert(now);
        }
    }
    next.current_stage_id = None;
    next.overall_status = OverallStatus::Cancelled;
    next.comments.push(Comment::new(
        actor_id,
        "Cancelled by submitter",
        CommentKind::Comment,
    ));

    tracing::info!(item_id = %next.id, actor_id = %actor_id, "item cancelled");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ApprovalStore;
    use crate::workflow::stages::ApprovalStage;
    use crate::workflow::types::NewApprovalItemInput;

    fn stage(id: &str, order: u32, approvers: &[&str], quorum: u32, optional: bool) -> ApprovalStage {
        ApprovalStage {
            id: id.to_string(),
            name: id.to_string(),
            order,
            required_approvers: approvers.iter().map(|a| a.to_string()).collect(),
            min_approvals: quorum,
            optional,
        }
    }

    fn two_stage_plan() -> StagePlan {
        StagePlan::new(vec![
            stage("design", 1, &["alex", "bo"], 1, false),
            stage("legal", 2, &["dana", "eli"], 1, false),
        ])
        .expect("valid plan")
    }

    fn submit(plan: &StagePlan, title: &str) -> ApprovalItem {
        let mut store = ApprovalStore::new();
        store
            .submit(
                plan,
                NewApprovalItemInput {
                    title: title.to_string(),
                    submitted_by: "sam".to_string(),
                    ..Default::default()
                },
            )
            .expect("submit")
    }

    fn approve(stage: &str, actor: &str) -> ApprovalAction {
        ApprovalAction::Approve {
            stage_id: stage.to_string(),
            actor_id: actor.to_string(),
            comment: None,
        }
    }

    #[test]
    fn test_single_approval_advances_to_next_stage() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Spring campaign post");

        let item = apply_action(&plan, &item, approve("design", "alex")).expect("approve");
        assert_eq!(item.outcome("design").unwrap().status, StageStatus::Approved);
        assert_eq!(item.current_stage_id.as_deref(), Some("legal"));
        assert_eq!(item.overall_status, OverallStatus::Pending);
        assert_eq!(item.derive_status(&plan), OverallStatus::Pending);

        let item = apply_action(&plan, &item, approve("legal", "dana")).expect("approve");
        assert_eq!(item.overall_status, OverallStatus::Approved);
        assert_eq!(item.current_stage_id, None);
        assert_eq!(item.derive_status(&plan), OverallStatus::Approved);
    }

    #[test]
    fn test_quorum_counts_distinct_approvers() {
        let plan = StagePlan::new(vec![stage("design", 1, &["alex", "bo"], 2, false)])
            .expect("valid plan");
        let item = submit(&plan, "Carousel draft");

        let item = apply_action(&plan, &item, approve("design", "alex")).expect("approve");
        assert_eq!(item.overall_status, OverallStatus::Pending);
        assert_eq!(item.outcome("design").unwrap().approved_by.len(), 1);

        // Same approver again: a no-op, not a second vote.
        let item = apply_action(&plan, &item, approve("design", "alex")).expect("approve");
        assert_eq!(item.outcome("design").unwrap().approved_by.len(), 1);
        assert_eq!(item.overall_status, OverallStatus::Pending);

        let item = apply_action(&plan, &item, approve("design", "bo")).expect("approve");
        assert_eq!(item.overall_status, OverallStatus::Approved);
    }

    #[test]
    fn test_reject_requires_comment() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Teaser video");
        let err = apply_action(
            &plan,
            &item,
            ApprovalAction::Reject {
                stage_id: "design".to_string(),
                actor_id: "alex".to_string(),
                comment: "   ".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::Validation { .. }));
    }

    #[test]
    fn test_reject_is_terminal_and_appends_comment() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Teaser video");
        let item = apply_action(
            &plan,
            &item,
            ApprovalAction::Reject {
                stage_id: "design".to_string(),
                actor_id: "alex".to_string(),
                comment: "needs better image".to_string(),
            },
        )
        .expect("reject");
        assert_eq!(item.overall_status, OverallStatus::Rejected);
        assert_eq!(item.current_stage_id.as_deref(), Some("design"));
        assert_eq!(item.derive_status(&plan), OverallStatus::Rejected);
        let last = item.comments.last().expect("comment appended");
        assert_eq!(last.kind, CommentKind::Rejection);
        assert_eq!(last.message, "needs better image");

        let err = apply_action(&plan, &item, approve("design", "bo")).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidState { status: OverallStatus::Rejected }
        ));
    }

    #[test]
    fn test_revision_request_is_distinct_from_rejection() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Story frame");
        let item = apply_action(
            &plan,
            &item,
            ApprovalAction::RequestRevision {
                stage_id: "design".to_string(),
                actor_id: "bo".to_string(),
                comment: "swap the hero shot".to_string(),
            },
        )
        .expect("revision");
        assert_eq!(item.overall_status, OverallStatus::RevisionRequested);
        assert_eq!(item.derive_status(&plan), OverallStatus::RevisionRequested);
        assert_eq!(item.comments.last().unwrap().kind, CommentKind::Revision);
    }

    #[test]
    fn test_cancel_rules() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Launch teaser");

        // Cancel while pending succeeds.
        let cancelled = apply_action(
            &plan,
            &item,
            ApprovalAction::Cancel { actor_id: "sam".to_string() },
        )
        .expect("cancel");
        assert_eq!(cancelled.overall_status, OverallStatus::Cancelled);
        assert_eq!(cancelled.current_stage_id, None);
        assert_eq!(cancelled.derive_status(&plan), OverallStatus::Cancelled);

        // Cancel after approval fails.
        let approved = apply_action(&plan, &item, approve("design", "alex")).expect("approve");
        let approved = apply_action(&plan, &approved, approve("legal", "dana")).expect("approve");
        let err = apply_action(
            &plan,
            &approved,
            ApprovalAction::Cancel { actor_id: "sam".to_string() },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidState { status: OverallStatus::Approved }
        ));
    }

    #[test]
    fn test_cancel_after_revision_request() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Reel cut");
        let item = apply_action(
            &plan,
            &item,
            ApprovalAction::RequestRevision {
                stage_id: "design".to_string(),
                actor_id: "alex".to_string(),
                comment: "tighten the intro".to_string(),
            },
        )
        .expect("revision");
        let item = apply_action(
            &plan,
            &item,
            ApprovalAction::Cancel { actor_id: "sam".to_string() },
        )
        .expect("cancel");
        assert_eq!(item.overall_status, OverallStatus::Cancelled);
        assert_eq!(item.derive_status(&plan), OverallStatus::Cancelled);
    }

    #[test]
    fn test_stale_stage_rejected() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Banner set");
        let item = apply_action(&plan, &item, approve("design", "alex")).expect("approve");

        // design already advanced; acting on it again is stale.
        let err = apply_action(&plan, &item, approve("design", "bo")).unwrap_err();
        assert!(matches!(err, TransitionError::StaleStage { .. }));
    }

    #[test]
    fn test_actor_outside_stage_approvers_rejected() {
        let plan = two_stage_plan();
        let item = submit(&plan, "Banner set");
        let err = apply_action(&plan, &item, approve("design", "dana")).unwrap_err();
        assert!(matches!(err, TransitionError::NotAnApprover { .. }));
    }

    #[test]
    fn test_optional_stage_skipped_on_advance() {
        let plan = StagePlan::new(vec![
            stage("design", 1, &["alex"], 1, false),
            stage("copy-polish", 2, &["cam"], 1, true),
            stage("legal", 3, &["dana"], 1, false),
        ])
        .expect("valid plan");
        let item = submit(&plan, "Quote card");
        let item = apply_action(&plan, &item, approve("design", "alex")).expect("approve");
        assert_eq!(item.outcome("copy-polish").unwrap().status, StageStatus::Skipped);
        assert_eq!(item.current_stage_id.as_deref(), Some("legal"));
        assert_eq!(item.derive_status(&plan), OverallStatus::Pending);
    }
}
