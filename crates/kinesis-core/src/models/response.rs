use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::input::ResponseValue;
use super::rules::TriggeredAlert;

/// One superseded state of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HistoryEntry {
    pub value: Option<ResponseValue>,
    pub is_skipped: bool,
    pub skip_reason: Option<String>,
    pub recorded_at: jiff::Timestamp,
    pub recorded_by: Uuid,
}

/// Append-only log of superseded response states, oldest first.
///
/// There is deliberately no way to remove or edit an entry once pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct History(Vec<HistoryEntry>);

impl History {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }
}

/// The committed answer to one item within one checklist instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Response {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub item_id: Uuid,
    pub item_key: String,
    pub value: Option<ResponseValue>,
    pub is_skipped: bool,
    pub skip_reason: Option<String>,
    pub response_history: History,
    #[serde(default)]
    pub triggered_alerts: Vec<TriggeredAlert>,
    pub created_at: jiff::Timestamp,
    pub updated_at: jiff::Timestamp,
    pub updated_by: Uuid,
}

impl Response {
    pub fn new(instance_id: Uuid, item_id: Uuid, item_key: impl Into<String>, author: Uuid) -> Self {
        let now = jiff::Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            instance_id,
            item_id,
            item_key: item_key.into(),
            value: None,
            is_skipped: false,
            skip_reason: None,
            response_history: History::default(),
            triggered_alerts: Vec::new(),
            created_at: now,
            updated_at: now,
            updated_by: author,
        }
    }

    /// Record a new value. The state being replaced moves to history first,
    /// unless this is the response's first write.
    pub fn record_value(&mut self, value: ResponseValue, author: Uuid) {
        self.archive_current();
        self.value = Some(value);
        self.is_skipped = false;
        self.skip_reason = None;
        self.touch(author);
    }

    /// Mark the item skipped. The previous state moves to history.
    pub fn record_skip(&mut self, reason: Option<String>, author: Uuid) {
        self.archive_current();
        self.value = None;
        self.is_skipped = true;
        self.skip_reason = reason;
        self.touch(author);
    }

    /// Counts toward progress: either a value or an explicit skip.
    pub fn is_resolved(&self) -> bool {
        self.value.is_some() || self.is_skipped
    }

    /// The committed value, ignoring skipped responses.
    pub fn answered_value(&self) -> Option<&ResponseValue> {
        if self.is_skipped {
            None
        } else {
            self.value.as_ref()
        }
    }

    fn archive_current(&mut self) {
        if !self.is_resolved() {
            return;
        }
        self.response_history.push(HistoryEntry {
            value: self.value.clone(),
            is_skipped: self.is_skipped,
            skip_reason: self.skip_reason.clone(),
            recorded_at: self.updated_at,
            recorded_by: self.updated_by,
        });
    }

    fn touch(&mut self, author: Uuid) {
        self.updated_at = jiff::Timestamp::now();
        self.updated_by = author;
    }
}

/// The response ledger document of one checklist instance, keyed by item id.
/// A map key per item makes the (instance, item) pair unique by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResponseSet {
    pub instance_id: Uuid,
    pub responses: BTreeMap<Uuid, Response>,
}

impl ResponseSet {
    pub fn new(instance_id: Uuid) -> Self {
        Self {
            instance_id,
            responses: BTreeMap::new(),
        }
    }

    pub fn get(&self, item_id: Uuid) -> Option<&Response> {
        self.responses.get(&item_id)
    }
}
