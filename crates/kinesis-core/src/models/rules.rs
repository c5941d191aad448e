use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::condition::Condition;
use super::label::Label;

/// Constraints a captured value must satisfy before it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "rule", rename_all = "snake_case")]
#[ts(export)]
pub enum ValidationRule {
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Step {
        step: f64,
    },
    MinLength {
        min: usize,
    },
    MaxLength {
        max: usize,
    },
    MinSelections {
        min: usize,
    },
    MaxSelections {
        max: usize,
    },
    AllowedValues {
        values: Vec<String>,
    },
    NotBlank,
    All {
        rules: Vec<ValidationRule>,
    },
    #[serde(other)]
    Unsupported,
}

impl ValidationRule {
    /// Stable identifier reported back to callers when this rule fails.
    pub fn rule_id(&self) -> &'static str {
        match self {
            Self::Range { .. } => "range",
            Self::Step { .. } => "step",
            Self::MinLength { .. } => "min_length",
            Self::MaxLength { .. } => "max_length",
            Self::MinSelections { .. } => "min_selections",
            Self::MaxSelections { .. } => "max_selections",
            Self::AllowedValues { .. } => "allowed_values",
            Self::NotBlank => "not_blank",
            Self::All { .. } => "all",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A decision-support trigger attached to an item. Evaluated whenever the
/// item's response is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DecisionRule {
    pub id: String,
    pub condition: Condition,
    pub severity: AlertSeverity,
    pub message: Label,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TriggeredAlert {
    pub rule_id: String,
    pub severity: AlertSeverity,
    pub message: Label,
    pub triggered_at: jiff::Timestamp,
}
