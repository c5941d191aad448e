use std::collections::HashSet;

use kinesis_core::models::input::{InputConfig, ResponseValue};
use kinesis_core::models::rules::ValidationRule;
use kinesis_core::models::template::Item;

use crate::error::ValidationFailure;

/// Defines the valid range for a numeric answer.
#[derive(Debug, Clone, Copy)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
    pub step: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() || value < self.min || value > self.max {
            return false;
        }
        if let Some(step) = self.step
            && step > 0.0
        {
            let offset = value - self.min;
            let remainder = offset % step;
            // Allow floating point tolerance
            remainder < 1e-9 || (step - remainder) < 1e-9
        } else {
            true
        }
    }
}

/// Check a value against the item's input type, the intrinsic limits of
/// its input configuration, and its declared validation rules, in that order.
pub fn validate_value(item: &Item, value: &ResponseValue) -> Result<(), ValidationFailure> {
    let input_type = item.input.input_type();
    if !value.fits(input_type) {
        return Err(failure(
            item,
            "input_type",
            format!("a {} value cannot answer a {input_type} item", value.kind()),
        ));
    }

    check_input_config(item, value)?;

    if let Some(rule) = &item.validation_rules {
        check_rule(item, rule, value)?;
    }
    Ok(())
}

/// A skip of a currently-required item must carry a non-blank reason.
pub fn validate_skip(
    item: &Item,
    required_now: bool,
    reason: Option<&str>,
) -> Result<(), ValidationFailure> {
    let has_reason = reason.is_some_and(|r| !r.trim().is_empty());
    if required_now && !has_reason {
        return Err(failure(
            item,
            "skip_reason_required",
            "a reason is required to skip a required item".to_string(),
        ));
    }
    Ok(())
}

fn check_input_config(item: &Item, value: &ResponseValue) -> Result<(), ValidationFailure> {
    match (&item.input, value) {
        (InputConfig::Slider { min, max, step, .. }, ResponseValue::Number(n)) => {
            let range = NumericRange {
                min: *min,
                max: *max,
                step: *step,
            };
            if !range.contains(*n) {
                return Err(failure(
                    item,
                    "slider_range",
                    format!("{n} is outside [{min}, {max}] or off-step"),
                ));
            }
        }
        (InputConfig::Percentage { .. }, ResponseValue::Number(n)) => {
            if !(0.0..=100.0).contains(n) {
                return Err(failure(
                    item,
                    "percentage_range",
                    format!("{n} is not a percentage"),
                ));
            }
        }
        (InputConfig::QuickSelect { options }, ResponseValue::Choice(c)) => {
            if !options.iter().any(|o| &o.value == c) {
                return Err(failure(item, "option", format!("'{c}' is not an option")));
            }
        }
        (
            InputConfig::MultiSelect {
                options,
                max_selections,
            },
            ResponseValue::Choices(cs),
        ) => {
            if let Some(unknown) = cs.iter().find(|c| !options.iter().any(|o| &o.value == *c)) {
                return Err(failure(
                    item,
                    "option",
                    format!("'{unknown}' is not an option"),
                ));
            }
            let distinct: HashSet<&String> = cs.iter().collect();
            if distinct.len() != cs.len() {
                return Err(failure(
                    item,
                    "duplicate_selection",
                    "an option was selected more than once".to_string(),
                ));
            }
            if let Some(max) = max_selections
                && cs.len() > *max
            {
                return Err(failure(
                    item,
                    "max_selections",
                    format!("at most {max} selections allowed"),
                ));
            }
        }
        (InputConfig::BodyDiagram { regions }, ResponseValue::BodyDiagram(marks)) => {
            for mark in marks {
                if !regions.iter().any(|r| r.value == mark.region) {
                    return Err(failure(
                        item,
                        "region",
                        format!("'{}' is not a body region", mark.region),
                    ));
                }
                if mark.intensity.is_some_and(|i| i > 10) {
                    return Err(failure(
                        item,
                        "intensity",
                        format!("intensity for '{}' must be 0-10", mark.region),
                    ));
                }
            }
        }
        (InputConfig::VoiceOrText { max_length }, ResponseValue::Text { text, .. }) => {
            if let Some(max) = max_length
                && text.chars().count() > *max
            {
                return Err(failure(
                    item,
                    "max_length",
                    format!("text exceeds {max} characters"),
                ));
            }
        }
        (InputConfig::Duration { max_minutes }, ResponseValue::Duration { minutes }) => {
            if let Some(max) = max_minutes
                && minutes > max
            {
                return Err(failure(
                    item,
                    "max_minutes",
                    format!("{minutes} minutes exceeds {max}"),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_rule(
    item: &Item,
    rule: &ValidationRule,
    value: &ResponseValue,
) -> Result<(), ValidationFailure> {
    let ok = match rule {
        ValidationRule::All { rules } => {
            for r in rules {
                check_rule(item, r, value)?;
            }
            return Ok(());
        }
        ValidationRule::Range { min, max } => match value.as_number() {
            Some(n) => min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m),
            None => true,
        },
        ValidationRule::Step { step } => match value.as_number() {
            Some(n) if *step > 0.0 => {
                let remainder = n.abs() % step;
                remainder < 1e-9 || (step - remainder) < 1e-9
            }
            _ => true,
        },
        ValidationRule::MinLength { min } => text_len(value).is_none_or(|len| len >= *min),
        ValidationRule::MaxLength { max } => text_len(value).is_none_or(|len| len <= *max),
        ValidationRule::MinSelections { min } => selections(value).is_none_or(|n| n >= *min),
        ValidationRule::MaxSelections { max } => selections(value).is_none_or(|n| n <= *max),
        ValidationRule::AllowedValues { values } => match value {
            ResponseValue::Choice(c) => values.contains(c),
            ResponseValue::Choices(cs) => cs.iter().all(|c| values.contains(c)),
            ResponseValue::Text { text, .. } => values.iter().any(|v| v == text.trim()),
            _ => true,
        },
        ValidationRule::NotBlank => match value {
            ResponseValue::Text { text, .. } => !text.trim().is_empty(),
            ResponseValue::Choices(cs) => !cs.is_empty(),
            ResponseValue::BodyDiagram(marks) => !marks.is_empty(),
            _ => true,
        },
        ValidationRule::Unsupported => false,
    };

    if ok {
        Ok(())
    } else {
        Err(failure(item, rule.rule_id(), describe(rule)))
    }
}

fn text_len(value: &ResponseValue) -> Option<usize> {
    match value {
        ResponseValue::Text { text, .. } => Some(text.trim().chars().count()),
        _ => None,
    }
}

fn selections(value: &ResponseValue) -> Option<usize> {
    match value {
        ResponseValue::Choices(cs) => Some(cs.len()),
        ResponseValue::BodyDiagram(marks) => Some(marks.len()),
        _ => None,
    }
}

fn describe(rule: &ValidationRule) -> String {
    match rule {
        ValidationRule::Range { min, max } => match (min, max) {
            (Some(min), Some(max)) => format!("value must be between {min} and {max}"),
            (Some(min), None) => format!("value must be at least {min}"),
            (None, Some(max)) => format!("value must be at most {max}"),
            (None, None) => "value is out of range".to_string(),
        },
        ValidationRule::Step { step } => format!("value must be a multiple of {step}"),
        ValidationRule::MinLength { min } => format!("text must be at least {min} characters"),
        ValidationRule::MaxLength { max } => format!("text must be at most {max} characters"),
        ValidationRule::MinSelections { min } => format!("select at least {min}"),
        ValidationRule::MaxSelections { max } => format!("select at most {max}"),
        ValidationRule::AllowedValues { .. } => "value is not allowed".to_string(),
        ValidationRule::NotBlank => "a value is required".to_string(),
        ValidationRule::All { .. } => "value failed validation".to_string(),
        ValidationRule::Unsupported => "unsupported validation rule".to_string(),
    }
}

fn failure(item: &Item, rule: &str, message: String) -> ValidationFailure {
    ValidationFailure {
        item_id: item.id,
        item_key: item.key.clone(),
        rule: rule.to_string(),
        message,
    }
}
