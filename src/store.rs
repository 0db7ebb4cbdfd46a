use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::stages::StagePlan;
use crate::workflow::types::{
    ApprovalItem, NewApprovalItemInput, OverallStatus, StageOutcome, StageStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },
    #[error("no approval item with id {id}")]
    NotFound { id: Uuid },
}

/// Filter for [`ApprovalStore::list`]. Empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub overall_status: Option<OverallStatus>,
    pub submitted_by: Option<String>,
    pub client_id: Option<String>,
    #[serde(default)]
    pub order: ItemOrder,
}

impl ItemFilter {
    fn matches(&self, item: &ApprovalItem) -> bool {
        if let Some(status) = self.overall_status {
            if item.overall_status != status {
                return false;
            }
        }
        if let Some(submitted_by) = &self.submitted_by {
            if &item.submitted_by != submitted_by {
                return false;
            }
        }
        if let Some(client_id) = &self.client_id {
            if item.client_id.as_deref() != Some(client_id.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrder {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    PriorityDesc,
    DueDateAsc,
}

/// In-memory collection of approval items.
///
/// Deliberately dumb: `replace` is the only mutation primitive and no
/// business rules live here. Transition rules belong to the engine, which
/// callers run between `get` and `replace`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalStore {
    items: HashMap<Uuid, ApprovalItem>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct and insert a fresh item, all stage outcomes pending except
    /// leading optional stages, which the cursor skips at submit time.
    pub fn submit(
        &mut self,
        plan: &StagePlan,
        input: NewApprovalItemInput,
    ) -> Result<ApprovalItem, StoreError> {
        if input.title.trim().is_empty() {
            return Err(StoreError::Validation {
                reason: "title must not be empty".to_string(),
            });
        }

        let now = Utc::now();
        // A validated plan always carries at least one required stage.
        let first_pos = plan
            .next_required_index_from(0)
            .ok_or_else(|| StoreError::Validation {
                reason: "no required stages configured".to_string(),
            })?;
        let first_required = &plan.ordered_stages()[first_pos];
        let stage_outcomes: Vec<StageOutcome> = plan
            .ordered_stages()
            .iter()
            .enumerate()
            .map(|(pos, stage)| {
                let mut outcome = StageOutcome::pending(&stage.id);
                if pos < first_pos {
                    outcome.status = StageStatus::Skipped;
                    outcome.completed_at = Some(now);
                }
                outcome
            })
            .collect();

        let item = ApprovalItem {
            id: Uuid::new_v4(),
            title: input.title,
            submitted_by: input.submitted_by,
            client_id: input.client_id,
            created_at: now,
            current_stage_id: Some(first_required.id.clone()),
            overall_status: OverallStatus::Pending,
            stage_outcomes,
            priority: input.priority,
            due_date: input.due_date,
            comments: Vec::new(),
        };
        tracing::info!(
            item_id = %item.id,
            title = %item.title,
            submitted_by = %item.submitted_by,
            current_stage = %first_required.id,
            "approval item submitted"
        );
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    pub fn get(&self, id: Uuid) -> Result<&ApprovalItem, StoreError> {
        self.items.get(&id).ok_or(StoreError::NotFound { id })
    }

    /// Whole-item swap. The only way existing items change.
    pub fn replace(&mut self, item: ApprovalItem) -> Result<(), StoreError> {
        if !self.items.contains_key(&item.id) {
            return Err(StoreError::NotFound { id: item.id });
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    pub fn list(&self, filter: &ItemFilter) -> Vec<&ApprovalItem> {
        let mut items: Vec<&ApprovalItem> =
            self.items.values().filter(|i| filter.matches(i)).collect();
        match filter.order {
            ItemOrder::CreatedAtDesc => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            ItemOrder::CreatedAtAsc => {
                items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            }
            ItemOrder::PriorityDesc => {
                items.sort_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then_with(|| b.created_at.cmp(&a.created_at))
                });
            }
            ItemOrder::DueDateAsc => {
                // Items without a due date sort last.
                items.sort_by(|a, b| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => b.created_at.cmp(&a.created_at),
                });
            }
        }
        items
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
