use std::collections::BTreeMap;

use kinesis_core::models::input::ResponseValue;
use kinesis_core::models::response::ResponseSet;
use kinesis_core::models::template::Template;
use kinesis_rules::snapshot::ResponseSnapshot;
use kinesis_rules::visibility::item_states;
use serde::Serialize;

/// Completion of one instance against its pinned template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// `floor(resolved / required_visible * 100)`, or 100 when nothing
    /// required is currently visible.
    pub percentage: u8,
    pub required_visible: usize,
    /// Required, visible items with a committed value or a skip.
    pub resolved: usize,
}

/// Compute progress from one snapshot of the ledger.
///
/// Items in hidden sections and hidden items drop out of both counts. Their
/// responses stay in the ledger untouched.
pub fn compute_progress(
    template: &Template,
    responses: &ResponseSet,
    baseline: &BTreeMap<String, ResponseValue>,
) -> ProgressReport {
    let snapshot = ResponseSnapshot::new(responses, baseline);
    let mut required_visible = 0;
    let mut resolved = 0;

    for state in item_states(template, &snapshot) {
        if !state.required {
            continue;
        }
        required_visible += 1;
        if responses.get(state.item.id).is_some_and(|r| r.is_resolved()) {
            resolved += 1;
        }
    }

    let percentage = if required_visible == 0 {
        100
    } else {
        u8::try_from(resolved * 100 / required_visible).unwrap_or(100)
    };

    ProgressReport {
        percentage,
        required_visible,
        resolved,
    }
}
