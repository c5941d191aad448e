use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("event channel closed")]
    ChannelClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
