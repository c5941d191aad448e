use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::input::ResponseValue;
use super::template::VisitType;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ChecklistStatus {
    InProgress,
    Completed,
    Abandoned,
    Reviewed,
    Locked,
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Reviewed => "reviewed",
            Self::Locked => "locked",
        }
    }

    /// The forward-only lifecycle:
    /// `in_progress → {completed, abandoned}`, `completed → reviewed`,
    /// `reviewed → locked`.
    pub fn can_transition_to(&self, next: ChecklistStatus) -> bool {
        matches!(
            (self, next),
            (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Abandoned)
                | (Self::Completed, Self::Reviewed)
                | (Self::Reviewed, Self::Locked)
        )
    }

    /// Whether responses and drafts may still be written.
    pub fn accepts_responses(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed)
    }

    /// Whether a note may be (re)generated and stored.
    pub fn accepts_note(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed | Self::Reviewed)
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NoteGenerationStatus {
    NotGenerated,
    Completed,
    /// A note exists but responses changed after it was generated.
    Stale,
}

/// A rendered clinical note, stored on the instance it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GeneratedNote {
    pub note: String,
    pub note_localized: String,
    /// Items whose responses contributed to the note. These can no longer
    /// be hard-deleted.
    pub referenced_items: BTreeSet<Uuid>,
    pub generated_at: jiff::Timestamp,
    pub generated_by: Uuid,
}

/// One concrete checklist tied to a single patient encounter, pinned to the
/// template version it was started from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VisitChecklist {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub clinic_id: Uuid,
    pub template_id: Uuid,
    pub template_code: String,
    pub template_version: u32,
    pub visit_type: VisitType,
    pub status: ChecklistStatus,
    /// Last computed progress. A hint only; recomputed from the ledger.
    pub progress_percentage: u8,
    pub started_at: jiff::Timestamp,
    pub completed_at: Option<jiff::Timestamp>,
    #[serde(default)]
    pub acknowledged_incomplete: bool,
    pub reviewed_at: Option<jiff::Timestamp>,
    pub reviewed_by: Option<Uuid>,
    pub locked_at: Option<jiff::Timestamp>,
    pub locked_by: Option<Uuid>,
    pub abandoned_at: Option<jiff::Timestamp>,
    pub abandon_reason: Option<String>,
    /// The prior instance the baseline was captured from.
    pub baseline_instance_id: Option<Uuid>,
    /// Committed values of the prior visit, keyed by item key.
    #[serde(default)]
    pub baseline: BTreeMap<String, ResponseValue>,
    pub note: Option<GeneratedNote>,
    pub note_generation_status: NoteGenerationStatus,
    pub updated_at: jiff::Timestamp,
}

impl VisitChecklist {
    /// Move to `next`, stamping the matching timestamp.
    pub fn transition_to(&mut self, next: ChecklistStatus, actor: Uuid) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = jiff::Timestamp::now();
        match next {
            ChecklistStatus::Completed => self.completed_at = Some(now),
            ChecklistStatus::Abandoned => self.abandoned_at = Some(now),
            ChecklistStatus::Reviewed => {
                self.reviewed_at = Some(now);
                self.reviewed_by = Some(actor);
            }
            ChecklistStatus::Locked => {
                self.locked_at = Some(now);
                self.locked_by = Some(actor);
            }
            ChecklistStatus::InProgress => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Whether the stored note references `item_id`.
    pub fn note_references(&self, item_id: Uuid) -> bool {
        self.note
            .as_ref()
            .is_some_and(|n| n.referenced_items.contains(&item_id))
    }
}

/// Index entry written under the patient so prior visits can be found.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PatientChecklistRef {
    pub checklist_id: Uuid,
    pub template_code: String,
    pub started_at: jiff::Timestamp,
}
