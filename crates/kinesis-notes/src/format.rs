//! Rendering of individual response values as note text.

use kinesis_core::models::input::{InputConfig, ResponseValue};
use kinesis_core::models::label::Locale;
use kinesis_core::models::template::Item;

use crate::phrases::{Phrases, fill};

/// Format a number with at most two decimals and no trailing zeros.
pub fn number(n: f64) -> String {
    let rounded = (n * 100.0).round() / 100.0;
    if rounded == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    format!("{rounded}")
}

pub fn value(item: &Item, value: &ResponseValue, locale: Locale, phrases: &Phrases) -> String {
    match value {
        ResponseValue::Checked(b) | ResponseValue::YesNo(b) => {
            if *b {
                phrases.yes.clone()
            } else {
                phrases.no.clone()
            }
        }
        ResponseValue::Number(n) => match item.input.unit() {
            Some("%") => format!("{}%", number(*n)),
            Some(unit) => format!("{} {unit}", number(*n)),
            None => number(*n),
        },
        ResponseValue::Choice(c) => choice_label(&item.input, c, locale),
        ResponseValue::Choices(cs) => cs
            .iter()
            .map(|c| choice_label(&item.input, c, locale))
            .collect::<Vec<_>>()
            .join(", "),
        ResponseValue::Text { text, .. } => text.trim().to_string(),
        ResponseValue::BodyDiagram(marks) => marks
            .iter()
            .map(|m| {
                let region = choice_label(&item.input, &m.region, locale);
                match m.intensity {
                    Some(i) => format!("{region} ({i}/10)"),
                    None => region,
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        ResponseValue::Duration { minutes } => format!("{minutes} {}", phrases.minutes),
    }
}

/// Describe the change from baseline for items that measure a trend.
pub fn delta(
    item: &Item,
    current: &ResponseValue,
    baseline: Option<&ResponseValue>,
    phrases: &Phrases,
) -> Option<String> {
    let higher_is_better = item.input.trend_direction()?;
    let current = current.as_number()?;
    let baseline = baseline?.as_number()?;
    let diff = current - baseline;
    let baseline_text = number(baseline);

    if diff.abs() < 0.005 {
        return Some(fill(&phrases.unchanged, &[("baseline", &baseline_text)]));
    }
    let improved = if higher_is_better { diff > 0.0 } else { diff < 0.0 };
    let phrase = if improved {
        &phrases.improved
    } else {
        &phrases.worsened
    };
    Some(fill(
        phrase,
        &[("delta", &number(diff.abs())), ("baseline", &baseline_text)],
    ))
}

fn choice_label(input: &InputConfig, raw: &str, locale: Locale) -> String {
    input
        .choices()
        .iter()
        .find(|c| c.value == raw)
        .map(|c| c.label.text(locale).to_string())
        .unwrap_or_else(|| raw.to_string())
}
