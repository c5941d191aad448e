use tokio::sync::mpsc;
use tracing::info;

use crate::error::AuditError;
use crate::events::CompletionEvent;

/// Where outbound completion events are delivered.
pub trait EventSink: Send + Sync {
    fn completed(&self, event: &CompletionEvent) -> Result<(), AuditError>;
}

/// Logs completion events as JSON and delivers them nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn completed(&self, event: &CompletionEvent) -> Result<(), AuditError> {
        let payload = serde_json::to_string(event)?;
        info!(
            instance_id = %event.instance_id,
            event = %payload,
            "checklist completed"
        );
        Ok(())
    }
}

/// Forwards completion events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn completed(&self, event: &CompletionEvent) -> Result<(), AuditError> {
        self.tx
            .send(event.clone())
            .map_err(|_| AuditError::ChannelClosed)
    }
}
