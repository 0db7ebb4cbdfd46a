//! Notification boundary. The workflow core fires an event after every
//! successful transition; delivery is best-effort and at-most-once, and a
//! delivery failure never rolls back the transition that produced it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Submitted,
    Approved,
    Rejected,
    RevisionRequested,
    Cancelled,
    Commented,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub item_id: Uuid,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,
    #[error("delivery failed: {reason}")]
    DeliveryFailed { reason: String },
}

/// Outbound side of the boundary. Implementations must not block the
/// workflow for long: the coordinator awaits the call but discards errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Notifier that just logs the event. The default collaborator.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            item_id = %event.item_id,
            kind = ?event.kind,
            "workflow notification"
        );
        Ok(())
    }
}

/// Notifier that drops every event. For hosts that switch notifications off.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that hands events to a channel, decoupling delivery from the
/// transition path. The host drains the receiver however it likes (webhook,
/// chat integration, test assertion).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event)
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
