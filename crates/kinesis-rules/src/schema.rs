//! Structural checks run on a template draft before it is published.

use std::collections::HashSet;

use kinesis_core::models::condition::Condition;
use kinesis_core::models::input::InputConfig;
use kinesis_core::models::rules::ValidationRule;
use kinesis_core::models::template::TemplateDraft;

use crate::error::SchemaError;

/// Codes and item keys end up in storage keys and condition references, so
/// they are restricted to a conservative character set.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn check_draft(draft: &TemplateDraft) -> Result<(), SchemaError> {
    let mut problems = Vec::new();

    if !is_valid_identifier(&draft.code) {
        problems.push(format!("invalid template code '{}'", draft.code));
    }
    if draft.name.primary.trim().is_empty() {
        problems.push("template name is empty".to_string());
    }
    if draft.sections.is_empty() {
        problems.push("template has no sections".to_string());
    }

    let mut keys = HashSet::new();
    for section in &draft.sections {
        for item in &section.items {
            if !is_valid_identifier(&item.key) {
                problems.push(format!("invalid item key '{}'", item.key));
            } else if !keys.insert(item.key.as_str()) {
                problems.push(format!("duplicate item key '{}'", item.key));
            }
        }
    }

    for section in &draft.sections {
        let title = &section.title.primary;
        if let Some(c) = &section.display_conditions {
            check_condition(c, &keys, &format!("section '{title}'"), &mut problems);
        }
        for item in &section.items {
            let at = format!("item '{}'", item.key);
            check_input(&item.input, &at, &mut problems);
            if let Some(c) = &item.display_conditions {
                check_condition(c, &keys, &at, &mut problems);
            }
            if let Some(c) = &item.required_conditions {
                check_condition(c, &keys, &at, &mut problems);
            }
            if let Some(rule) = &item.validation_rules {
                check_validation(rule, &at, &mut problems);
            }
            if item.auto_populate
                && let Some(source) = &item.auto_populate_source
                && !is_valid_identifier(source)
            {
                problems.push(format!("{at}: invalid auto-populate source '{source}'"));
            }
            let mut rule_ids = HashSet::new();
            for rule in &item.decision_rules {
                if !rule_ids.insert(rule.id.as_str()) {
                    problems.push(format!("{at}: duplicate decision rule '{}'", rule.id));
                }
                check_condition(&rule.condition, &keys, &at, &mut problems);
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { problems })
    }
}

fn check_condition(
    condition: &Condition,
    keys: &HashSet<&str>,
    at: &str,
    problems: &mut Vec<String>,
) {
    if contains_unsupported(condition) {
        problems.push(format!("{at}: condition uses an unsupported operator"));
    }
    for field in condition.referenced_fields() {
        if !keys.contains(field) {
            problems.push(format!("{at}: condition references unknown item '{field}'"));
        }
    }
}

fn contains_unsupported(condition: &Condition) -> bool {
    match condition {
        Condition::Unsupported => true,
        Condition::All { conditions } | Condition::Any { conditions } => {
            conditions.iter().any(contains_unsupported)
        }
        Condition::Not { condition } => contains_unsupported(condition),
        _ => false,
    }
}

fn check_validation(rule: &ValidationRule, at: &str, problems: &mut Vec<String>) {
    match rule {
        ValidationRule::Unsupported => {
            problems.push(format!("{at}: unsupported validation rule"));
        }
        ValidationRule::All { rules } => {
            for r in rules {
                check_validation(r, at, problems);
            }
        }
        ValidationRule::Step { step } if *step <= 0.0 => {
            problems.push(format!("{at}: step must be positive"));
        }
        _ => {}
    }
}

fn check_input(input: &InputConfig, at: &str, problems: &mut Vec<String>) {
    match input {
        InputConfig::Slider { min, max, step, .. } => {
            if min >= max {
                problems.push(format!("{at}: slider min must be below max"));
            }
            if step.is_some_and(|s| s <= 0.0) {
                problems.push(format!("{at}: slider step must be positive"));
            }
        }
        InputConfig::QuickSelect { options } | InputConfig::MultiSelect { options, .. } => {
            if options.is_empty() {
                problems.push(format!("{at}: no options defined"));
            }
        }
        InputConfig::BodyDiagram { regions } => {
            if regions.is_empty() {
                problems.push(format!("{at}: no body regions defined"));
            }
        }
        _ => {}
    }
}
