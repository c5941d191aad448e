use kinesis_core::error::CoreError;
use kinesis_core::models::checklist::ChecklistStatus;
use kinesis_notes::error::NoteError;
use kinesis_rules::error::ValidationFailure;
use kinesis_storage::error::StorageError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ChecklistStatus,
        to: ChecklistStatus,
    },

    #[error("checklist is {status} and no longer accepts changes")]
    Finalized { status: ChecklistStatus },

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationFailure),

    #[error("progress {progress}% is below the completion threshold of {threshold}%")]
    Incomplete { progress: u8, threshold: u8 },

    #[error("conflicting write to {key}")]
    ConflictingWrite { key: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("response for item {item_id} is referenced by a generated note")]
    ResponseReferenced { item_id: Uuid },

    #[error("autosave worker has stopped")]
    AutosaveStopped,

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("note error: {0}")]
    Note(#[from] NoteError),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Map a storage error, naming what was missing if the object was absent.
    pub(crate) fn from_storage(kind: &'static str, id: impl ToString) -> impl FnOnce(StorageError) -> Self {
        move |e| match e {
            StorageError::NotFound { .. } => Self::not_found(kind, id),
            other => other.into(),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { key } => Self::NotFound {
                kind: "document",
                id: key,
            },
            StorageError::PreconditionFailed { key } => Self::ConflictingWrite { key },
            StorageError::Serialization(e) => Self::Serialization(e),
            other => Self::Storage(other),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            CoreError::Serialization(e) => Self::Serialization(e),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
