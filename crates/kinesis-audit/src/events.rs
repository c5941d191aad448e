use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// What an audit event acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Template,
    Checklist,
    Response,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Checklist => "checklist",
            Self::Response => "response",
        }
    }
}

/// Who did what to which clinical record, and when.
///
/// The persisted documents are the record of what a checklist contains.
/// Audit events carry the actor and intent alongside them and are written
/// through `tracing`, so they end up wherever the host ships its logs.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub resource: Resource,
    pub resource_id: Uuid,
    pub actor: Uuid,
    pub at: jiff::Timestamp,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, resource: Resource, resource_id: Uuid, actor: Uuid) -> Self {
        Self {
            action: action.into(),
            resource,
            resource_id,
            actor,
            at: jiff::Timestamp::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn emit(&self) {
        info!(
            audit.action = %self.action,
            audit.resource = self.resource.as_str(),
            audit.resource_id = %self.resource_id,
            audit.actor = %self.actor,
            audit.at = %self.at,
            audit.details = %self.details,
            "audit event"
        );
    }
}

/// Emitted when a checklist moves to `completed`. Billing and reporting
/// collaborators consume this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub instance_id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub template_code: String,
    pub progress_percentage: u8,
    pub acknowledged_incomplete: bool,
    pub completed_at: jiff::Timestamp,
}
