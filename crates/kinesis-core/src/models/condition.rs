use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A boolean expression over the current responses of a checklist instance.
///
/// `field` always names an item `key`, never a surrogate id, so that an
/// expression survives template re-versioning unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
#[ts(export)]
pub enum Condition {
    Equals {
        field: String,
        value: serde_json::Value,
    },
    NotEquals {
        field: String,
        value: serde_json::Value,
    },
    In {
        field: String,
        values: Vec<serde_json::Value>,
    },
    GreaterThan {
        field: String,
        value: f64,
    },
    GreaterOrEqual {
        field: String,
        value: f64,
    },
    LessThan {
        field: String,
        value: f64,
    },
    LessOrEqual {
        field: String,
        value: f64,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    /// Compares the current numeric value of `field` with the patient's
    /// pinned baseline for the same item: `(current - baseline) <cmp> delta`.
    CompareToBaseline {
        field: String,
        comparison: Comparison,
        #[serde(default)]
        delta: f64,
    },
    /// Any operator this build does not understand. Always evaluates false.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equals,
    NotEquals,
}

impl Comparison {
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessThan => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equals => (lhs - rhs).abs() < 1e-9,
            Self::NotEquals => (lhs - rhs).abs() >= 1e-9,
        }
    }
}

impl Condition {
    /// Every item key this expression reads, depth-first.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::In { field, .. }
            | Self::GreaterThan { field, .. }
            | Self::GreaterOrEqual { field, .. }
            | Self::LessThan { field, .. }
            | Self::LessOrEqual { field, .. }
            | Self::CompareToBaseline { field, .. } => out.push(field),
            Self::All { conditions } | Self::Any { conditions } => {
                for c in conditions {
                    c.collect_fields(out);
                }
            }
            Self::Not { condition } => condition.collect_fields(out),
            Self::Unsupported => {}
        }
    }
}
