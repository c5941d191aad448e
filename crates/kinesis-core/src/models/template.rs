use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::condition::Condition;
use super::input::InputConfig;
use super::label::Label;
use super::rules::{DecisionRule, ValidationRule};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum VisitType {
    InitialEvaluation,
    FollowUp,
    Reassessment,
    Discharge,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialEvaluation => "initial_evaluation",
            Self::FollowUp => "follow_up",
            Self::Reassessment => "reassessment",
            Self::Discharge => "discharge",
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_evaluation" => Ok(Self::InitialEvaluation),
            "follow_up" => Ok(Self::FollowUp),
            "reassessment" => Ok(Self::Reassessment),
            "discharge" => Ok(Self::Discharge),
            other => Err(CoreError::UnknownVariant {
                kind: "visit type",
                value: other.to_string(),
            }),
        }
    }
}

/// The clinical-note bucket a section's narrative is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NoteRole {
    Subjective,
    Objective,
    Assessment,
    Plan,
}

impl NoteRole {
    pub const ALL: [NoteRole; 4] = [
        NoteRole::Subjective,
        NoteRole::Objective,
        NoteRole::Assessment,
        NoteRole::Plan,
    ];
}

/// A published, immutable template version with its full section/item tree.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Template {
    pub id: Uuid,
    pub code: String,
    pub clinic_id: Uuid,
    pub name: Label,
    pub visit_type: VisitType,
    /// Diagnosis codes this template is intended for. `None` means any.
    #[serde(default)]
    pub diagnosis_filter: Option<Vec<String>>,
    pub version: u32,
    pub is_current_version: bool,
    pub previous_version_id: Option<Uuid>,
    /// Sorted by `sort_order` at publication.
    pub sections: Vec<Section>,
    pub published_at: jiff::Timestamp,
    pub published_by: Uuid,
}

impl Template {
    /// All items with their owning section, in rendering order.
    pub fn items(&self) -> impl Iterator<Item = (&Section, &Item)> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter().map(move |i| (s, i)))
    }

    pub fn item(&self, id: Uuid) -> Option<(&Section, &Item)> {
        self.items().find(|(_, i)| i.id == id)
    }

    pub fn item_by_key(&self, key: &str) -> Option<(&Section, &Item)> {
        self.items().find(|(_, i)| i.key == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Section {
    pub id: Uuid,
    pub title: Label,
    pub sort_order: i32,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub display_conditions: Option<Condition>,
    /// Note bucket for this section. Sections without one are reported as
    /// omitted in the generated note.
    #[serde(default)]
    pub note_role: Option<NoteRole>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Item {
    pub id: Uuid,
    /// Stable across versions; referenced by conditions and baselines.
    pub key: String,
    pub label: Label,
    pub sort_order: i32,
    pub input: InputConfig,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub required_conditions: Option<Condition>,
    #[serde(default)]
    pub auto_populate: bool,
    /// Item key in the prior visit to seed from. Defaults to this item's key.
    #[serde(default)]
    pub auto_populate_source: Option<String>,
    #[serde(default)]
    pub display_conditions: Option<Condition>,
    #[serde(default)]
    pub validation_rules: Option<ValidationRule>,
    #[serde(default)]
    pub decision_rules: Vec<DecisionRule>,
}

/// An unpublished template submitted by a clinic administrator. Section and
/// item ids are reassigned on publication.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TemplateDraft {
    pub code: String,
    pub clinic_id: Uuid,
    pub name: Label,
    pub visit_type: VisitType,
    #[serde(default)]
    pub diagnosis_filter: Option<Vec<String>>,
    pub sections: Vec<Section>,
    pub author: Uuid,
}

/// Pointer to the current version of a template code within a clinic.
/// Replacing this document is the commit point of a publication.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TemplateHead {
    pub clinic_id: Uuid,
    pub code: String,
    pub visit_type: VisitType,
    pub template_id: Uuid,
    pub version: u32,
    pub updated_at: jiff::Timestamp,
}
