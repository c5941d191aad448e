use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A captured value (or skip) rejected by an item's rules. Carries the
/// failing rule so the client can correct the input inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{item_key}: {message} (rule: {rule})")]
pub struct ValidationFailure {
    pub item_id: Uuid,
    pub item_key: String,
    pub rule: String,
    pub message: String,
}

/// Structural problems found in a template draft before publication.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("template is invalid: {}", problems.join("; "))]
pub struct SchemaError {
    pub problems: Vec<String>,
}
