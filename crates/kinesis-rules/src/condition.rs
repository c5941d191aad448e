//! Condition evaluation.
//!
//! Absence is a distinct, non-matching state: a field with no committed
//! value never satisfies `equals`, `in`, or a numeric comparison, and always
//! satisfies `not_equals`.
//!
//! Operators this build does not know make the whole expression undecided,
//! however deeply they are nested. An undecided display condition hides its
//! item and an undecided required condition or alert rule does not fire.

use kinesis_core::models::condition::Condition;
use kinesis_core::models::input::ResponseValue;
use serde_json::Value;
use tracing::debug;

use crate::snapshot::ResponseSnapshot;

const EPSILON: f64 = 1e-9;

/// Whether an item or section with this display condition is shown.
/// No condition means always shown.
pub fn visible(expr: Option<&Condition>, snapshot: &ResponseSnapshot<'_>) -> bool {
    expr.is_none_or(|c| evaluate(c, snapshot))
}

/// Whether an item is currently required: statically, or because its
/// required condition holds.
pub fn required(
    is_required: bool,
    expr: Option<&Condition>,
    snapshot: &ResponseSnapshot<'_>,
) -> bool {
    is_required || expr.is_some_and(|c| evaluate(c, snapshot))
}

/// Two-valued evaluation: undecided counts as false.
pub fn evaluate(condition: &Condition, snapshot: &ResponseSnapshot<'_>) -> bool {
    decide(condition, snapshot).unwrap_or(false)
}

/// Three-valued evaluation. `None` when the expression contains an operator
/// this build does not understand; `not` and the combinators propagate it.
pub fn decide(condition: &Condition, snapshot: &ResponseSnapshot<'_>) -> Option<bool> {
    let outcome = match condition {
        Condition::Equals { field, value } => snapshot
            .value(field)
            .is_some_and(|v| matches_literal(v, value)),
        Condition::NotEquals { field, value } => snapshot
            .value(field)
            .is_none_or(|v| !matches_literal(v, value)),
        Condition::In { field, values } => snapshot
            .value(field)
            .is_some_and(|v| values.iter().any(|l| matches_literal(v, l))),
        Condition::GreaterThan { field, value } => numeric(snapshot, field, |n| n > *value),
        Condition::GreaterOrEqual { field, value } => numeric(snapshot, field, |n| n >= *value),
        Condition::LessThan { field, value } => numeric(snapshot, field, |n| n < *value),
        Condition::LessOrEqual { field, value } => numeric(snapshot, field, |n| n <= *value),
        Condition::All { conditions } => all_decided(conditions, snapshot)?.into_iter().all(|b| b),
        Condition::Any { conditions } => all_decided(conditions, snapshot)?.into_iter().any(|b| b),
        Condition::Not { condition } => !decide(condition, snapshot)?,
        Condition::CompareToBaseline {
            field,
            comparison,
            delta,
        } => {
            let current = snapshot.value(field).and_then(ResponseValue::as_number);
            let baseline = snapshot.baseline(field).and_then(ResponseValue::as_number);
            match (current, baseline) {
                (Some(c), Some(b)) => comparison.holds(c - b, *delta),
                _ => false,
            }
        }
        Condition::Unsupported => {
            debug!("unsupported condition operator; expression undecided");
            return None;
        }
    };
    Some(outcome)
}

fn all_decided(conditions: &[Condition], snapshot: &ResponseSnapshot<'_>) -> Option<Vec<bool>> {
    conditions.iter().map(|c| decide(c, snapshot)).collect()
}

fn numeric(snapshot: &ResponseSnapshot<'_>, field: &str, test: impl Fn(f64) -> bool) -> bool {
    snapshot
        .value(field)
        .and_then(ResponseValue::as_number)
        .is_some_and(test)
}

/// Compare a captured value with a literal from a condition expression.
/// Multi-valued answers match when they contain the literal.
fn matches_literal(value: &ResponseValue, literal: &Value) -> bool {
    match (value, literal) {
        (ResponseValue::Checked(b) | ResponseValue::YesNo(b), Value::Bool(l)) => b == l,
        (ResponseValue::YesNo(b), Value::String(s)) => match s.as_str() {
            "yes" => *b,
            "no" => !*b,
            _ => false,
        },
        (ResponseValue::Number(_) | ResponseValue::Duration { .. }, Value::Number(l)) => {
            match (value.as_number(), l.as_f64()) {
                (Some(v), Some(l)) => (v - l).abs() < EPSILON,
                _ => false,
            }
        }
        (ResponseValue::Choice(c), Value::String(s)) => c == s,
        (ResponseValue::Choices(cs), Value::String(s)) => cs.iter().any(|c| c == s),
        (ResponseValue::Text { text, .. }, Value::String(s)) => text.trim() == s.trim(),
        (ResponseValue::BodyDiagram(marks), Value::String(s)) => {
            marks.iter().any(|m| &m.region == s)
        }
        _ => false,
    }
}
