// Signoff Library - Staged Content Approval Workflow
// This exposes the core components for testing and host integration

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod notify;
pub mod persistence;
pub mod projections;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, init_config, SignoffConfig};
pub use coordinator::{ApprovalCoordinator, WorkflowError};
pub use notify::{
    ChannelNotifier, LogNotifier, NotificationEvent, NotificationKind, Notifier, NullNotifier,
};
pub use persistence::{JsonSnapshotPersistence, PersistenceError, StorePersistence};
pub use projections::{counts_by_status, due_soon, overdue, progress};
pub use store::{ApprovalStore, ItemFilter, ItemOrder, StoreError};
pub use telemetry::init_telemetry;
pub use workflow::{
    apply_action, ApprovalAction, ApprovalItem, ApprovalStage, Comment, CommentKind, ConfigError,
    NewApprovalItemInput, OverallStatus, Priority, StageOutcome, StagePlan, StageStatus,
    TransitionError,
};
