use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage-plan problems detected at load time. Fatal at startup: a
/// [`StagePlan`] cannot be constructed from a malformed stage list.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no approval stages configured")]
    EmptyPlan,
    #[error("duplicate stage id: {stage_id}")]
    DuplicateStageId { stage_id: String },
    #[error("stage order must be strictly increasing: stage {stage_id} has order {order}, previous was {previous}")]
    OrderNotIncreasing {
        stage_id: String,
        order: u32,
        previous: u32,
    },
    #[error("stage {stage_id} has no required approvers")]
    NoApprovers { stage_id: String },
    #[error("stage {stage_id} quorum {min_approvals} exceeds approver count {approvers}")]
    QuorumTooLarge {
        stage_id: String,
        min_approvals: u32,
        approvers: usize,
    },
    #[error("stage {stage_id} quorum must be at least 1")]
    ZeroQuorum { stage_id: String },
    #[error("every configured stage is optional; at least one required stage is needed")]
    AllStagesOptional,
}

/// One sequential phase of approval requiring a quorum of named approvers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStage {
    pub id: String,
    pub name: String,
    /// Position in the sequence; the plan enforces strictly increasing order.
    pub order: u32,
    pub required_approvers: BTreeSet<String>,
    /// Minimum number of distinct approvers needed to pass this stage.
    pub min_approvals: u32,
    /// Optional stages are skipped when the cursor advances past them.
    #[serde(default)]
    pub optional: bool,
}

impl ApprovalStage {
    pub fn has_approver(&self, actor_id: &str) -> bool {
        self.required_approvers.contains(actor_id)
    }
}

/// Validated, ordered stage configuration. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan {
    stages: Vec<ApprovalStage>,
}

impl StagePlan {
    /// Build a plan from configured stages, rejecting malformed input.
    pub fn new(mut stages: Vec<ApprovalStage>) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::EmptyPlan);
        }
        stages.sort_by_key(|s| s.order);

        let mut seen_ids = HashSet::new();
        let mut previous_order: Option<u32> = None;
        for stage in &stages {
            if !seen_ids.insert(stage.id.clone()) {
                return Err(ConfigError::DuplicateStageId {
                    stage_id: stage.id.clone(),
                });
            }
            if let Some(previous) = previous_order {
                if stage.order <= previous {
                    return Err(ConfigError::OrderNotIncreasing {
                        stage_id: stage.id.clone(),
                        order: stage.order,
                        previous,
                    });
                }
            }
            previous_order = Some(stage.order);

            if stage.required_approvers.is_empty() {
                return Err(ConfigError::NoApprovers {
                    stage_id: stage.id.clone(),
                });
            }
            if stage.min_approvals == 0 {
                return Err(ConfigError::ZeroQuorum {
                    stage_id: stage.id.clone(),
                });
            }
            if stage.min_approvals as usize > stage.required_approvers.len() {
                return Err(ConfigError::QuorumTooLarge {
                    stage_id: stage.id.clone(),
                    min_approvals: stage.min_approvals,
                    approvers: stage.required_approvers.len(),
                });
            }
        }
        if stages.iter().all(|s| s.optional) {
            return Err(ConfigError::AllStagesOptional);
        }
        Ok(Self { stages })
    }

    /// Stages in ascending `order`.
    pub fn ordered_stages(&self) -> &[ApprovalStage] {
        &self.stages
    }

    pub fn stage(&self, stage_id: &str) -> Option<&ApprovalStage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Index of a stage within the ordered sequence.
    pub fn position(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    /// First required stage starting at `from`, or `None` when only optional
    /// stages (or nothing) remain. Used for cursor placement at submit time
    /// and when advancing past an approved stage.
    pub fn next_required_from(&self, from: usize) -> Option<&ApprovalStage> {
        self.stages.iter().skip(from).find(|s| !s.optional)
    }

    /// Like [`StagePlan::next_required_from`] but yields the index.
    pub fn next_required_index_from(&self, from: usize) -> Option<usize> {
        self.stages
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, s)| !s.optional)
            .map(|(i, _)| i)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
