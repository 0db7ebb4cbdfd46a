use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::notify::{LogNotifier, NotificationEvent, NotificationKind, Notifier};
use crate::projections;
use crate::store::{ApprovalStore, ItemFilter, StoreError};
use crate::workflow::engine::{self, ApprovalAction, TransitionError};
use crate::workflow::stages::StagePlan;
use crate::workflow::types::{
    ApprovalItem, Comment, CommentKind, NewApprovalItemInput, OverallStatus,
};

/// Umbrella error for the coordinator's public surface. Typed results, not
/// panics: callers render these inline.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Front door of the workflow: owns the validated stage plan, the item
/// store, and the notification collaborator, and sequences every operation
/// as engine -> store -> notify. Notifications fire strictly after the
/// in-memory transition and can never affect its outcome.
pub struct ApprovalCoordinator {
    plan: StagePlan,
    store: ApprovalStore,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalCoordinator {
    pub fn new(plan: StagePlan, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            plan,
            store: ApprovalStore::new(),
            notifier,
        }
    }

    pub fn with_log_notifier(plan: StagePlan) -> Self {
        Self::new(plan, Arc::new(LogNotifier))
    }

    /// Rehydrate from a previously snapshotted store (see `persistence`).
    pub fn with_store(plan: StagePlan, store: ApprovalStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            plan,
            store,
            notifier,
        }
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn store(&self) -> &ApprovalStore {
        &self.store
    }

    pub async fn submit(
        &mut self,
        input: NewApprovalItemInput,
    ) -> Result<ApprovalItem, WorkflowError> {
        let item = self.store.submit(&self.plan, input)?;
        self.emit(NotificationEvent {
            item_id: item.id,
            kind: NotificationKind::Submitted,
            payload: json!({
                "title": item.title,
                "submitted_by": item.submitted_by,
                "current_stage_id": item.current_stage_id,
            }),
        })
        .await;
        Ok(item)
    }

    pub async fn apply_action(
        &mut self,
        item_id: Uuid,
        action: ApprovalAction,
    ) -> Result<ApprovalItem, WorkflowError> {
        let (kind, acted_stage) = match &action {
            ApprovalAction::Approve { stage_id, .. } => {
                (NotificationKind::Approved, Some(stage_id.clone()))
            }
            ApprovalAction::Reject { stage_id, .. } => {
                (NotificationKind::Rejected, Some(stage_id.clone()))
            }
            ApprovalAction::RequestRevision { stage_id, .. } => {
                (NotificationKind::RevisionRequested, Some(stage_id.clone()))
            }
            ApprovalAction::Cancel { .. } => (NotificationKind::Cancelled, None),
        };
        let current = self.store.get(item_id)?;
        let next = engine::apply_action(&self.plan, current, action)?;
        self.store.replace(next.clone())?;

        let mut payload = json!({
            "title": next.title,
            "overall_status": next.overall_status,
            "current_stage_id": next.current_stage_id,
        });
        // Stage-level detail so subscribers can tell a partial approval
        // from a stage pass without re-fetching the item.
        if let Some(outcome) = acted_stage.as_deref().and_then(|s| next.outcome(s)) {
            payload["stage_id"] = json!(outcome.stage_id);
            payload["stage_status"] = json!(outcome.status);
            payload["approvals"] = json!(outcome.approved_by.len());
        }
        self.emit(NotificationEvent {
            item_id,
            kind,
            payload,
        })
        .await;
        Ok(next)
    }

    pub fn get(&self, item_id: Uuid) -> Result<&ApprovalItem, WorkflowError> {
        Ok(self.store.get(item_id)?)
    }

    pub fn list(&self, filter: &ItemFilter) -> Vec<&ApprovalItem> {
        self.store.list(filter)
    }

    pub fn progress(&self, item_id: Uuid) -> Result<f64, WorkflowError> {
        Ok(projections::progress(self.store.get(item_id)?))
    }

    pub fn counts_by_status(&self) -> BTreeMap<OverallStatus, usize> {
        projections::counts_by_status(self.store.iter())
    }

    pub fn due_soon(&self, within_hours: i64) -> Vec<&ApprovalItem> {
        projections::due_soon(self.store.iter(), within_hours)
    }

    pub fn overdue(&self) -> Vec<&ApprovalItem> {
        projections::overdue(self.store.iter())
    }

    /// Append a free-form discussion comment. Single-level threading only:
    /// a reply must point at a top-level comment.
    pub async fn comment(
        &mut self,
        item_id: Uuid,
        author_id: &str,
        message: &str,
        parent_id: Option<Uuid>,
    ) -> Result<ApprovalItem, WorkflowError> {
        if message.trim().is_empty() {
            return Err(TransitionError::Validation {
                reason: "comment message must not be empty".to_string(),
            }
            .into());
        }
        let mut item = self.store.get(item_id)?.clone();
        if let Some(parent) = parent_id {
            let parent_comment = item
                .comments
                .iter()
                .find(|c| c.id == parent)
                .ok_or_else(|| TransitionError::Validation {
                    reason: format!("parent comment {parent} not found"),
                })?;
            if parent_comment.parent_id.is_some() {
                return Err(TransitionError::Validation {
                    reason: "replies to replies are not supported".to_string(),
                }
                .into());
            }
        }
        let mut comment = Comment::new(author_id, message, CommentKind::Comment);
        comment.parent_id = parent_id;
        item.comments.push(comment);
        self.store.replace(item.clone())?;
        self.emit(NotificationEvent {
            item_id,
            kind: NotificationKind::Commented,
            payload: json!({ "author_id": author_id }),
        })
        .await;
        Ok(item)
    }

    /// Fire-and-forget: a failed delivery is logged and dropped, never
    /// propagated to the caller.
    async fn emit(&self, event: NotificationEvent) {
        let item_id = event.item_id;
        let kind = event.kind;
        if let Err(err) = self.notifier.notify(event).await {
            tracing::warn!(
                item_id = %item_id,
                kind = ?kind,
                error = %err,
                "notification delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::workflow::stages::ApprovalStage;

    fn plan() -> StagePlan {
        StagePlan::new(vec![ApprovalStage {
            id: "review".to_string(),
            name: "Review".to_string(),
            order: 1,
            required_approvers: ["alex".to_string()].into_iter().collect(),
            min_approvals: 1,
            optional: false,
        }])
        .expect("valid plan")
    }

    fn input(title: &str) -> NewApprovalItemInput {
        NewApprovalItemInput {
            title: title.to_string(),
            submitted_by: "sam".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_submit_and_approve_emit_notifications() {
        let (notifier, mut events) = ChannelNotifier::new();
        let mut coordinator = ApprovalCoordinator::new(plan(), Arc::new(notifier));

        let item = coordinator.submit(input("Launch post")).await.expect("submit");
        assert_eq!(events.recv().await.expect("event").kind, NotificationKind::Submitted);

        let item = coordinator
            .apply_action(
                item.id,
                ApprovalAction::Approve {
                    stage_id: "review".to_string(),
                    actor_id: "alex".to_string(),
                    comment: None,
                },
            )
            .await
            .expect("approve");
        assert_eq!(item.overall_status, OverallStatus::Approved);
        assert_eq!(events.recv().await.expect("event").kind, NotificationKind::Approved);
        assert!((coordinator.progress(item.id).expect("progress") - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_partial_approval_payload_carries_stage_progress() {
        let plan = StagePlan::new(vec![ApprovalStage {
            id: "review".to_string(),
            name: "Review".to_string(),
            order: 1,
            required_approvers: ["alex".to_string(), "bo".to_string()].into_iter().collect(),
            min_approvals: 2,
            optional: false,
        }])
        .expect("valid plan");
        let (notifier, mut events) = ChannelNotifier::new();
        let mut coordinator = ApprovalCoordinator::new(plan, Arc::new(notifier));

        let item = coordinator.submit(input("Quorum post")).await.expect("submit");
        events.recv().await.expect("submitted event");

        coordinator
            .apply_action(
                item.id,
                ApprovalAction::Approve {
                    stage_id: "review".to_string(),
                    actor_id: "alex".to_string(),
                    comment: None,
                },
            )
            .await
            .expect("first approval");
        let partial = events.recv().await.expect("partial approval event");
        assert_eq!(partial.kind, NotificationKind::Approved);
        assert_eq!(partial.payload["stage_id"], "review");
        assert_eq!(partial.payload["stage_status"], "pending");
        assert_eq!(partial.payload["approvals"], 1);
        assert_eq!(partial.payload["overall_status"], "pending");

        coordinator
            .apply_action(
                item.id,
                ApprovalAction::Approve {
                    stage_id: "review".to_string(),
                    actor_id: "bo".to_string(),
                    comment: None,
                },
            )
            .await
            .expect("second approval");
        let passed = events.recv().await.expect("stage pass event");
        assert_eq!(passed.payload["stage_status"], "approved");
        assert_eq!(passed.payload["approvals"], 2);
        assert_eq!(passed.payload["overall_status"], "approved");
    }

    #[tokio::test]
    async fn test_transition_survives_dead_notifier() {
        let (notifier, events) = ChannelNotifier::new();
        drop(events); // delivery will fail from the first event on
        let mut coordinator = ApprovalCoordinator::new(plan(), Arc::new(notifier));

        let item = coordinator.submit(input("Quiet post")).await.expect("submit");
        let item = coordinator
            .apply_action(
                item.id,
                ApprovalAction::Cancel { actor_id: "sam".to_string() },
            )
            .await
            .expect("cancel despite dead notifier");
        assert_eq!(item.overall_status, OverallStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let mut coordinator = ApprovalCoordinator::with_log_notifier(plan());
        let err = coordinator
            .apply_action(
                Uuid::new_v4(),
                ApprovalAction::Cancel { actor_id: "sam".to_string() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Store(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_comment_threading_is_single_level() {
        let mut coordinator = ApprovalCoordinator::with_log_notifier(plan());
        let item = coordinator.submit(input("Thread post")).await.expect("submit");

        let item = coordinator
            .comment(item.id, "kit", "love this", None)
            .await
            .expect("comment");
        let top = item.comments.last().expect("comment").id;

        let item = coordinator
            .comment(item.id, "sam", "thanks!", Some(top))
            .await
            .expect("reply");
        let reply = item.comments.last().expect("reply").id;

        let err = coordinator
            .comment(item.id, "kit", "nested", Some(reply))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Transition(TransitionError::Validation { .. })
        ));
    }
}
