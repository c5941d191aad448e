use kinesis_core::models::rules::TriggeredAlert;
use kinesis_core::models::template::Item;

use crate::condition::evaluate;
use crate::snapshot::ResponseSnapshot;

/// Evaluate the item's decision-support rules against a snapshot that
/// already includes the item's new value.
pub fn evaluate_alerts(item: &Item, snapshot: &ResponseSnapshot<'_>) -> Vec<TriggeredAlert> {
    let now = jiff::Timestamp::now();
    item.decision_rules
        .iter()
        .filter(|rule| evaluate(&rule.condition, snapshot))
        .map(|rule| TriggeredAlert {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            message: rule.message.clone(),
            triggered_at: now,
        })
        .collect()
}
