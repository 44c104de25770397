// Notification sinks for applied status changes

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::case_lifecycle::errors::NotifyError;
use crate::case_lifecycle::traits::NotificationSink;
use crate::case_lifecycle::types::StatusChange;

/// Writes every change to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify_status_changed(&self, change: &StatusChange) -> Result<(), NotifyError> {
        tracing::info!(
            actor = %change.actor,
            case_id = %change.case_id,
            project = %change.project,
            previous = %change.previous,
            current = %change.current,
            correlation_id = %change.correlation_id,
            "Case status change notification"
        );
        Ok(())
    }
}

/// Hands changes to a delivery worker over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<StatusChange>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusChange>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotificationSink for ChannelNotifier {
    async fn notify_status_changed(&self, change: &StatusChange) -> Result<(), NotifyError> {
        self.sender
            .send(change.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
