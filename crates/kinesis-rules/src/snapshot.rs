use std::collections::{BTreeMap, HashMap, HashSet};

use kinesis_core::models::input::ResponseValue;
use kinesis_core::models::response::ResponseSet;

/// The committed, non-skipped values of one instance keyed by item key,
/// plus the baseline pinned from the patient's prior visit.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot<'a> {
    values: HashMap<&'a str, &'a ResponseValue>,
    baseline: &'a BTreeMap<String, ResponseValue>,
}

impl<'a> ResponseSnapshot<'a> {
    pub fn new(set: &'a ResponseSet, baseline: &'a BTreeMap<String, ResponseValue>) -> Self {
        let values = set
            .responses
            .values()
            .filter_map(|r| r.answered_value().map(|v| (r.item_key.as_str(), v)))
            .collect();
        Self { values, baseline }
    }

    /// Current value of `key`. Skipped and unanswered items are absent.
    pub fn value(&self, key: &str) -> Option<&'a ResponseValue> {
        self.values.get(key).copied()
    }

    pub fn baseline(&self, key: &str) -> Option<&'a ResponseValue> {
        self.baseline.get(key)
    }

    /// The same snapshot with the values of `hidden` keys left out. The
    /// baseline is untouched.
    pub fn without(&self, hidden: &HashSet<&str>) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|&(key, _)| !hidden.contains(*key))
                .map(|(key, value)| (*key, *value))
                .collect(),
            baseline: self.baseline,
        }
    }
}
