use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::label::Label;

/// The closed set of capture widgets an item can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InputType {
    TapCheckbox,
    Slider,
    QuickSelect,
    VoiceOrText,
    BodyDiagram,
    Duration,
    MultiSelect,
    YesNo,
    Percentage,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TapCheckbox => "tap_checkbox",
            Self::Slider => "slider",
            Self::QuickSelect => "quick_select",
            Self::VoiceOrText => "voice_or_text",
            Self::BodyDiagram => "body_diagram",
            Self::Duration => "duration",
            Self::MultiSelect => "multi_select",
            Self::YesNo => "yes_no",
            Self::Percentage => "percentage",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable option for quick-select, multi-select and body-diagram items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Choice {
    pub value: String,
    pub label: Label,
}

/// Type-specific configuration of an item's input widget. The variant
/// determines both the item's `input_type` and the shape of value it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "input_type", content = "config", rename_all = "snake_case")]
#[ts(export)]
pub enum InputConfig {
    TapCheckbox,
    Slider {
        min: f64,
        max: f64,
        #[serde(default)]
        step: Option<f64>,
        #[serde(default)]
        unit: Option<String>,
        /// Direction used when describing change against a baseline.
        /// Pain scales are the common case, so lower is better by default.
        #[serde(default)]
        higher_is_better: bool,
    },
    QuickSelect {
        options: Vec<Choice>,
    },
    VoiceOrText {
        #[serde(default)]
        max_length: Option<usize>,
    },
    BodyDiagram {
        regions: Vec<Choice>,
    },
    Duration {
        #[serde(default)]
        max_minutes: Option<u32>,
    },
    MultiSelect {
        options: Vec<Choice>,
        #[serde(default)]
        max_selections: Option<usize>,
    },
    YesNo,
    Percentage {
        #[serde(default)]
        higher_is_better: bool,
    },
}

impl InputConfig {
    pub fn input_type(&self) -> InputType {
        match self {
            Self::TapCheckbox => InputType::TapCheckbox,
            Self::Slider { .. } => InputType::Slider,
            Self::QuickSelect { .. } => InputType::QuickSelect,
            Self::VoiceOrText { .. } => InputType::VoiceOrText,
            Self::BodyDiagram { .. } => InputType::BodyDiagram,
            Self::Duration { .. } => InputType::Duration,
            Self::MultiSelect { .. } => InputType::MultiSelect,
            Self::YesNo => InputType::YesNo,
            Self::Percentage { .. } => InputType::Percentage,
        }
    }

    /// Options a value may be drawn from, for the choice-based widgets.
    pub fn choices(&self) -> &[Choice] {
        match self {
            Self::QuickSelect { options } | Self::MultiSelect { options, .. } => options,
            Self::BodyDiagram { regions } => regions,
            _ => &[],
        }
    }

    /// `Some(higher_is_better)` for widgets whose values describe a
    /// clinical measure that can improve or worsen.
    pub fn trend_direction(&self) -> Option<bool> {
        match self {
            Self::Slider {
                higher_is_better, ..
            }
            | Self::Percentage { higher_is_better } => Some(*higher_is_better),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Slider { unit, .. } => unit.as_deref(),
            Self::Percentage { .. } => Some("%"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TextSource {
    Typed,
    Voice,
}

/// A marked region on a body diagram, with an optional 0–10 intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BodyMark {
    pub region: String,
    #[serde(default)]
    pub intensity: Option<u8>,
}

/// A captured answer. Each variant is the value shape of one or more input
/// types (see [`ResponseValue::fits`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[ts(export)]
pub enum ResponseValue {
    Checked(bool),
    Number(f64),
    Choice(String),
    Choices(Vec<String>),
    Text { text: String, source: TextSource },
    BodyDiagram(Vec<BodyMark>),
    Duration { minutes: u32 },
    YesNo(bool),
}

impl ResponseValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Checked(_) => "checked",
            Self::Number(_) => "number",
            Self::Choice(_) => "choice",
            Self::Choices(_) => "choices",
            Self::Text { .. } => "text",
            Self::BodyDiagram(_) => "body_diagram",
            Self::Duration { .. } => "duration",
            Self::YesNo(_) => "yes_no",
        }
    }

    /// Whether this value has the shape the given input type captures.
    pub fn fits(&self, input_type: InputType) -> bool {
        matches!(
            (input_type, self),
            (InputType::TapCheckbox, Self::Checked(_))
                | (InputType::Slider, Self::Number(_))
                | (InputType::Percentage, Self::Number(_))
                | (InputType::QuickSelect, Self::Choice(_))
                | (InputType::MultiSelect, Self::Choices(_))
                | (InputType::VoiceOrText, Self::Text { .. })
                | (InputType::BodyDiagram, Self::BodyDiagram(_))
                | (InputType::Duration, Self::Duration { .. })
                | (InputType::YesNo, Self::YesNo(_))
        )
    }

    /// Numeric reading used by comparisons and baseline deltas.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Duration { minutes } => Some(f64::from(*minutes)),
            _ => None,
        }
    }
}
