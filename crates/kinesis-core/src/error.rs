use thiserror::Error;

use crate::models::checklist::ChecklistStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ChecklistStatus,
        to: ChecklistStatus,
    },

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
