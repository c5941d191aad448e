mod common;

use std::sync::Arc;

use kinesis_audit::sink::TracingSink;
use kinesis_core::models::condition::Condition;
use kinesis_core::models::input::{ResponseValue, TextSource};
use kinesis_core::models::label::Label;
use kinesis_core::models::rules::{AlertSeverity, DecisionRule};
use kinesis_engine::error::EngineError;
use kinesis_engine::orchestrator::ChecklistEngine;
use proptest::prelude::*;
use uuid::Uuid;

use common::{config, draft, engine, follow_up, item, item_id, section, slider};

#[tokio::test]
async fn upsert_archives_previous_value() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let first_author = Uuid::new_v4();
    let second_author = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), first_author, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");

    let created = engine
        .submit_response(instance.id, pain, ResponseValue::Number(8.0), first_author)
        .await
        .unwrap();
    assert!(created.response_history.is_empty());

    let updated = engine
        .submit_response(instance.id, pain, ResponseValue::Number(6.0), second_author)
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.value, Some(ResponseValue::Number(6.0)));
    assert_eq!(updated.updated_by, second_author);
    let previous = updated.response_history.last().unwrap();
    assert_eq!(previous.value, Some(ResponseValue::Number(8.0)));
    assert_eq!(previous.recorded_by, first_author);
}

#[tokio::test]
async fn invalid_value_reports_failing_rule() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");

    let err = engine
        .submit_response(instance.id, pain, ResponseValue::Number(11.0), therapist)
        .await
        .unwrap_err();
    match err {
        EngineError::ValidationFailed(failure) => {
            assert_eq!(failure.rule, "slider_range");
            assert_eq!(failure.item_key, "pain");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = engine
        .submit_response(instance.id, pain, ResponseValue::YesNo(true), therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(f) if f.rule == "input_type"));

    let err = engine
        .submit_response(instance.id, Uuid::new_v4(), ResponseValue::Number(1.0), therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "item", .. }));
}

#[tokio::test]
async fn skipping_required_item_needs_reason() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();

    let err = engine
        .skip_item(instance.id, item_id(&template, "pain"), Some("   ".to_string()), therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(f) if f.rule == "skip_reason_required"));

    let skipped = engine
        .skip_item(instance.id, item_id(&template, "comment"), None, therapist)
        .await
        .unwrap();
    assert!(skipped.is_skipped);
    assert!(skipped.skip_reason.is_none());
}

#[tokio::test]
async fn batch_commits_all_or_nothing() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");
    let comment = item_id(&template, "comment");

    let err = engine
        .submit_batch(
            instance.id,
            vec![
                (
                    comment,
                    ResponseValue::Text {
                        text: "ok".to_string(),
                        source: TextSource::Typed,
                    },
                ),
                (pain, ResponseValue::Number(42.0)),
            ],
            therapist,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationFailed(_)));
    assert!(engine.responses(instance.id).await.unwrap().responses.is_empty());

    let written = engine
        .submit_batch(
            instance.id,
            vec![(pain, ResponseValue::Number(4.0)), (comment, ResponseValue::Text {
                text: "ok".to_string(),
                source: TextSource::Typed,
            })],
            therapist,
        )
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(engine.responses(instance.id).await.unwrap().responses.len(), 2);
    assert_eq!(engine.progress(instance.id).await.unwrap().percentage, 100);
}

#[tokio::test]
async fn delete_is_refused_once_a_note_references_the_response() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");
    let comment = item_id(&template, "comment");

    engine
        .submit_response(instance.id, comment, ResponseValue::Text {
            text: "typo".to_string(),
            source: TextSource::Typed,
        }, therapist)
        .await
        .unwrap();
    let removed = engine
        .delete_response(instance.id, comment, therapist)
        .await
        .unwrap();
    assert_eq!(removed.item_id, comment);
    let err = engine.get_response(instance.id, comment).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "response", .. }));

    engine
        .submit_response(instance.id, pain, ResponseValue::Number(2.0), therapist)
        .await
        .unwrap();
    engine.generate_note(instance.id, therapist).await.unwrap();

    let err = engine
        .delete_response(instance.id, pain, therapist)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ResponseReferenced { item_id } if item_id == pain));

    // correction still goes through upsert
    let corrected = engine
        .submit_response(instance.id, pain, ResponseValue::Number(3.0), therapist)
        .await
        .unwrap();
    assert_eq!(corrected.response_history.len(), 1);
}

#[tokio::test]
async fn concurrent_upserts_to_same_item_lose_nothing() {
    let (engine, _) = engine();
    let engine = Arc::new(engine);
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let transcriber = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");
    engine
        .submit_response(instance.id, pain, ResponseValue::Number(1.0), therapist)
        .await
        .unwrap();

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .submit_response(instance.id, pain, ResponseValue::Number(2.0), therapist)
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .submit_response(instance.id, pain, ResponseValue::Number(3.0), transcriber)
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_all_values_retained(&engine.get_response(instance.id, pain).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_upserts_from_separate_engines_lose_nothing() {
    let (first, store) = engine();
    let second = ChecklistEngine::new(store, &config(), Arc::new(TracingSink)).unwrap();
    let (first, second) = (Arc::new(first), Arc::new(second));

    let template = first
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = first
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");
    first
        .submit_response(instance.id, pain, ResponseValue::Number(1.0), therapist)
        .await
        .unwrap();

    let a = {
        let engine = first.clone();
        tokio::spawn(async move {
            engine
                .submit_response(instance.id, pain, ResponseValue::Number(2.0), therapist)
                .await
        })
    };
    let b = {
        let engine = second.clone();
        tokio::spawn(async move {
            engine
                .submit_response(instance.id, pain, ResponseValue::Number(3.0), therapist)
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_all_values_retained(&first.get_response(instance.id, pain).await.unwrap());
}

fn assert_all_values_retained(response: &kinesis_core::models::response::Response) {
    let mut seen: Vec<f64> = response
        .response_history
        .iter()
        .filter_map(|h| h.value.as_ref().and_then(|v| v.as_number()))
        .collect();
    seen.extend(response.value.as_ref().and_then(|v| v.as_number()));
    seen.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(seen, vec![1.0, 2.0, 3.0]);
    assert_eq!(response.response_history.len(), 2);
}

#[tokio::test]
async fn decision_rules_raise_alerts_on_write() {
    let (engine, _) = engine();
    let mut pain = item("pain", slider(), true);
    pain.decision_rules = vec![DecisionRule {
        id: "severe-pain".to_string(),
        condition: Condition::GreaterOrEqual {
            field: "pain".to_string(),
            value: 8.0,
        },
        severity: AlertSeverity::Critical,
        message: Label::new("Severe pain reported"),
    }];
    let template = engine
        .publish_template(draft("pain-check", Uuid::new_v4(), vec![section("Pain", true, vec![pain])]))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");

    let severe = engine
        .submit_response(instance.id, pain, ResponseValue::Number(9.0), therapist)
        .await
        .unwrap();
    assert_eq!(severe.triggered_alerts.len(), 1);
    assert_eq!(severe.triggered_alerts[0].rule_id, "severe-pain");

    let mild = engine
        .submit_response(instance.id, pain, ResponseValue::Number(2.0), therapist)
        .await
        .unwrap();
    assert!(mild.triggered_alerts.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn n_upserts_leave_n_minus_one_history_entries(
        values in prop::collection::vec(0u8..=10, 1..12)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (engine, _) = engine();
            let template = engine
                .publish_template(follow_up(Uuid::new_v4()))
                .await
                .unwrap();
            let therapist = Uuid::new_v4();
            let instance = engine
                .start_instance(Uuid::new_v4(), therapist, template.id)
                .await
                .unwrap();
            let pain = item_id(&template, "pain");

            let mut last = None;
            for v in &values {
                last = Some(
                    engine
                        .submit_response(instance.id, pain, ResponseValue::Number(f64::from(*v)), therapist)
                        .await
                        .unwrap(),
                );
            }
            let last = last.unwrap();
            prop_assert_eq!(last.response_history.len(), values.len() - 1);
            prop_assert_eq!(
                last.value,
                Some(ResponseValue::Number(f64::from(*values.last().unwrap())))
            );
            Ok(())
        })?;
    }
}
