use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::input::ResponseValue;

/// Unconfirmed, in-progress input captured by the client between commits.
///
/// The engine never interprets `ui_state`; `responses` are decoded only
/// when the therapist confirms the draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DraftSnapshot {
    #[serde(default)]
    pub responses: BTreeMap<Uuid, ResponseValue>,
    #[serde(default)]
    pub ui_state: serde_json::Value,
}

/// The single stored draft of an instance. Overwritten wholesale on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Draft {
    pub instance_id: Uuid,
    /// Monotonic per coordinator; later saves carry larger sequences.
    pub sequence: u64,
    pub saved_at: jiff::Timestamp,
    pub snapshot: DraftSnapshot,
}
