pub mod engine;
pub mod stages;
pub mod types;

pub use engine::{apply_action, ApprovalAction, TransitionError};
pub use stages::{ApprovalStage, ConfigError, StagePlan};
pub use types::{
    ApprovalItem, Comment, CommentKind, NewApprovalItemInput, OverallStatus, Priority,
    StageOutcome, StageStatus,
};
