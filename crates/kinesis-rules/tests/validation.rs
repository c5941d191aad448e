use kinesis_core::models::input::{BodyMark, Choice, InputConfig, ResponseValue, TextSource};
use kinesis_core::models::label::Label;
use kinesis_core::models::rules::ValidationRule;
use kinesis_core::models::template::Item;
use kinesis_rules::validation::{NumericRange, validate_skip, validate_value};
use uuid::Uuid;

fn item(key: &str, input: InputConfig) -> Item {
    Item {
        id: Uuid::new_v4(),
        key: key.to_string(),
        label: Label::new(key),
        sort_order: 0,
        input,
        is_required: false,
        required_conditions: None,
        auto_populate: false,
        auto_populate_source: None,
        display_conditions: None,
        validation_rules: None,
        decision_rules: Vec::new(),
    }
}

fn choices(values: &[&str]) -> Vec<Choice> {
    values
        .iter()
        .map(|v| Choice {
            value: v.to_string(),
            label: Label::new(*v),
        })
        .collect()
}

fn slider() -> InputConfig {
    InputConfig::Slider {
        min: 0.0,
        max: 10.0,
        step: Some(0.5),
        unit: None,
        higher_is_better: false,
    }
}

#[test]
fn range_with_step() {
    let range = NumericRange {
        min: 0.0,
        max: 10.0,
        step: Some(0.5),
    };
    assert!(range.contains(0.0));
    assert!(range.contains(7.5));
    assert!(range.contains(10.0));
    assert!(!range.contains(7.25));
    assert!(!range.contains(-0.5));
    assert!(!range.contains(f64::NAN));
}

#[test]
fn wrong_value_shape_is_rejected() {
    let pain = item("pain", slider());
    let err = validate_value(&pain, &ResponseValue::YesNo(true)).unwrap_err();
    assert_eq!(err.rule, "input_type");
    assert_eq!(err.item_key, "pain");
}

#[test]
fn slider_limits() {
    let pain = item("pain", slider());
    assert!(validate_value(&pain, &ResponseValue::Number(4.5)).is_ok());
    let err = validate_value(&pain, &ResponseValue::Number(11.0)).unwrap_err();
    assert_eq!(err.rule, "slider_range");
}

#[test]
fn percentage_bounds() {
    let adherence = item("adherence", InputConfig::Percentage { higher_is_better: true });
    assert!(validate_value(&adherence, &ResponseValue::Number(100.0)).is_ok());
    assert_eq!(
        validate_value(&adherence, &ResponseValue::Number(101.0))
            .unwrap_err()
            .rule,
        "percentage_range"
    );
}

#[test]
fn choice_must_be_an_option() {
    let side = item(
        "side",
        InputConfig::QuickSelect {
            options: choices(&["left", "right"]),
        },
    );
    assert!(validate_value(&side, &ResponseValue::Choice("left".to_string())).is_ok());
    assert_eq!(
        validate_value(&side, &ResponseValue::Choice("both".to_string()))
            .unwrap_err()
            .rule,
        "option"
    );
}

#[test]
fn multi_select_limits() {
    let aggravators = item(
        "aggravators",
        InputConfig::MultiSelect {
            options: choices(&["stairs", "sitting", "walking"]),
            max_selections: Some(2),
        },
    );
    let pick = |vals: &[&str]| {
        ResponseValue::Choices(vals.iter().map(|s| s.to_string()).collect())
    };
    assert!(validate_value(&aggravators, &pick(&["stairs"])).is_ok());
    assert_eq!(
        validate_value(&aggravators, &pick(&["stairs", "stairs"]))
            .unwrap_err()
            .rule,
        "duplicate_selection"
    );
    assert_eq!(
        validate_value(&aggravators, &pick(&["stairs", "sitting", "walking"]))
            .unwrap_err()
            .rule,
        "max_selections"
    );
}

#[test]
fn body_diagram_regions_and_intensity() {
    let map = item(
        "pain_map",
        InputConfig::BodyDiagram {
            regions: choices(&["lumbar", "left_knee"]),
        },
    );
    let ok = ResponseValue::BodyDiagram(vec![BodyMark {
        region: "lumbar".to_string(),
        intensity: Some(6),
    }]);
    assert!(validate_value(&map, &ok).is_ok());

    let too_hot = ResponseValue::BodyDiagram(vec![BodyMark {
        region: "lumbar".to_string(),
        intensity: Some(11),
    }]);
    assert_eq!(validate_value(&map, &too_hot).unwrap_err().rule, "intensity");
}

#[test]
fn declared_rules_apply_after_intrinsic_checks() {
    let mut notes = item("notes", InputConfig::VoiceOrText { max_length: None });
    notes.validation_rules = Some(ValidationRule::All {
        rules: vec![ValidationRule::NotBlank, ValidationRule::MaxLength { max: 5 }],
    });

    let text = |t: &str| ResponseValue::Text {
        text: t.to_string(),
        source: TextSource::Voice,
    };
    assert!(validate_value(&notes, &text("ok")).is_ok());
    assert_eq!(validate_value(&notes, &text("   ")).unwrap_err().rule, "not_blank");
    assert_eq!(
        validate_value(&notes, &text("too long")).unwrap_err().rule,
        "max_length"
    );
}

#[test]
fn unsupported_rule_rejects() {
    let mut pain = item("pain", slider());
    pain.validation_rules = Some(ValidationRule::Unsupported);
    assert_eq!(
        validate_value(&pain, &ResponseValue::Number(1.0))
            .unwrap_err()
            .rule,
        "unsupported"
    );
}

#[test]
fn skip_reason_only_required_for_required_items() {
    let pain = item("pain", slider());
    assert!(validate_skip(&pain, false, None).is_ok());
    assert_eq!(
        validate_skip(&pain, true, Some("  ")).unwrap_err().rule,
        "skip_reason_required"
    );
    assert!(validate_skip(&pain, true, Some("patient unable to rate")).is_ok());
}
