//! Object key conventions.
//!
//! Pure string functions with no storage dependency. These define the canonical
//! layout of documents in the backing key-value store.

use uuid::Uuid;

/// An immutable, published template version (full tree).
pub fn template(id: Uuid) -> String {
    format!("templates/{id}.json")
}

/// The current-version pointer for a template code within a clinic.
pub fn template_head(clinic_id: Uuid, code: &str) -> String {
    format!("template-heads/{clinic_id}/{code}.json")
}

pub fn template_heads_prefix(clinic_id: Uuid) -> String {
    format!("template-heads/{clinic_id}/")
}

pub fn checklist(id: Uuid) -> String {
    format!("checklists/{id}/checklist.json")
}

/// The response ledger of one checklist instance.
pub fn responses(id: Uuid) -> String {
    format!("checklists/{id}/responses.json")
}

pub fn draft(id: Uuid) -> String {
    format!("checklists/{id}/draft.json")
}

pub fn patient_checklist(patient_id: Uuid, checklist_id: Uuid) -> String {
    format!("patients/{patient_id}/checklists/{checklist_id}.json")
}

pub fn patient_checklists_prefix(patient_id: Uuid) -> String {
    format!("patients/{patient_id}/checklists/")
}
