#![allow(dead_code)]

use std::sync::Arc;

use kinesis_audit::events::CompletionEvent;
use kinesis_audit::sink::{ChannelSink, TracingSink};
use kinesis_core::models::condition::Condition;
use kinesis_core::models::input::InputConfig;
use kinesis_core::models::label::Label;
use kinesis_core::models::template::{
    Item, NoteRole, Section, Template, TemplateDraft, VisitType,
};
use kinesis_engine::config::{AutosaveConfig, EngineConfig};
use kinesis_engine::orchestrator::ChecklistEngine;
use kinesis_storage::memory::MemoryStore;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub fn config() -> EngineConfig {
    EngineConfig {
        autosave: AutosaveConfig {
            max_retries: 1,
            retry_backoff_ms: 1,
        },
        ..EngineConfig::default()
    }
}

pub fn engine() -> (ChecklistEngine<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = ChecklistEngine::new(store.clone(), &config(), Arc::new(TracingSink)).unwrap();
    (engine, store)
}

pub fn engine_with_events() -> (ChecklistEngine<MemoryStore>, UnboundedReceiver<CompletionEvent>) {
    let (sink, rx) = ChannelSink::new();
    let store = Arc::new(MemoryStore::new());
    let engine = ChecklistEngine::new(store, &config(), Arc::new(sink)).unwrap();
    (engine, rx)
}

pub fn item(key: &str, input: InputConfig, required: bool) -> Item {
    Item {
        id: Uuid::nil(),
        key: key.to_string(),
        label: Label::new(key),
        sort_order: 0,
        input,
        is_required: required,
        required_conditions: None,
        auto_populate: false,
        auto_populate_source: None,
        display_conditions: None,
        validation_rules: None,
        decision_rules: Vec::new(),
    }
}

pub fn slider() -> InputConfig {
    InputConfig::Slider {
        min: 0.0,
        max: 10.0,
        step: Some(1.0),
        unit: None,
        higher_is_better: false,
    }
}

pub fn text() -> InputConfig {
    InputConfig::VoiceOrText { max_length: None }
}

pub fn section(title: &str, required: bool, items: Vec<Item>) -> Section {
    Section {
        id: Uuid::nil(),
        title: Label::new(title),
        sort_order: 0,
        collapsible: false,
        is_required: required,
        display_conditions: None,
        note_role: Some(NoteRole::Subjective),
        items,
    }
}

pub fn draft(code: &str, clinic_id: Uuid, sections: Vec<Section>) -> TemplateDraft {
    TemplateDraft {
        code: code.to_string(),
        clinic_id,
        name: Label::new("Follow-up").with_secondary("متابعة"),
        visit_type: VisitType::FollowUp,
        diagnosis_filter: None,
        sections,
        author: Uuid::new_v4(),
    }
}

/// One required section with a required 0-10 pain slider and an optional
/// free-text comment.
pub fn follow_up(clinic_id: Uuid) -> TemplateDraft {
    draft(
        "follow-up",
        clinic_id,
        vec![section(
            "Pain",
            true,
            vec![item("pain", slider(), true), item("comment", text(), false)],
        )],
    )
}

/// A required yes/no `surgery` item and a required `incision` slider
/// shown only when surgery is answered yes.
pub fn post_op(clinic_id: Uuid) -> TemplateDraft {
    let mut incision = item("incision", slider(), true);
    incision.display_conditions = Some(Condition::Equals {
        field: "surgery".to_string(),
        value: serde_json::json!(true),
    });
    draft(
        "post-op",
        clinic_id,
        vec![section(
            "History",
            false,
            vec![item("surgery", InputConfig::YesNo, true), incision],
        )],
    )
}

pub fn item_id(template: &Template, key: &str) -> Uuid {
    template.item_by_key(key).unwrap().1.id
}
