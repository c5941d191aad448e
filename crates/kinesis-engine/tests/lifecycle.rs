mod common;

use kinesis_core::models::checklist::{ChecklistStatus, NoteGenerationStatus};
use kinesis_core::models::condition::Condition;
use kinesis_core::models::input::InputConfig;
use kinesis_core::models::input::{ResponseValue, TextSource};
use kinesis_engine::error::EngineError;
use uuid::Uuid;

use common::{engine, engine_with_events, follow_up, item, item_id, post_op};

#[tokio::test]
async fn follow_up_scenario_progress_and_caveat() {
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

    assert_eq!(engine.progress(instance.id).await.unwrap().percentage, 0);

    engine
        .submit_response(instance.id, pain, ResponseValue::Number(4.0), therapist)
        .await
        .unwrap();
    assert_eq!(engine.progress(instance.id).await.unwrap().percentage, 100);

    engine
        .skip_item(
            instance.id,
            pain,
            Some("patient unable to rate".to_string()),
            therapist,
        )
        .await
        .unwrap();
    assert_eq!(engine.progress(instance.id).await.unwrap().percentage, 100);

    let note = engine.generate_note(instance.id, therapist).await.unwrap();
    assert!(note.note.contains("pain was skipped: patient unable to rate"), "{}", note.note);
}

#[tokio::test]
async fn hidden_item_is_excluded_until_shown() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(post_op(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();

    // incision depends on an unanswered field, so only surgery counts
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 1);
    assert_eq!(progress.percentage, 0);

    let surgery = item_id(&template, "surgery");
    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(false), therapist)
        .await
        .unwrap();
    assert_eq!(engine.progress(instance.id).await.unwrap().percentage, 100);

    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(true), therapist)
        .await
        .unwrap();
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 2);
    assert_eq!(progress.percentage, 50);
}

#[tokio::test]
async fn hidden_response_survives_hide_and_show() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(post_op(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let surgery = item_id(&template, "surgery");
    let incision = item_id(&template, "incision");

    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(true), therapist)
        .await
        .unwrap();
    engine
        .submit_response(instance.id, incision, ResponseValue::Number(3.0), therapist)
        .await
        .unwrap();

    // hide
    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(false), therapist)
        .await
        .unwrap();
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 1);
    let hidden = engine.get_response(instance.id, incision).await.unwrap();
    assert_eq!(hidden.value, Some(ResponseValue::Number(3.0)));

    // show again
    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(true), therapist)
        .await
        .unwrap();
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 2);
    assert_eq!(progress.percentage, 100);
}

#[tokio::test]
async fn locked_instance_rejects_every_mutation() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let supervisor = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let pain = item_id(&template, "pain");

    engine
        .submit_response(instance.id, pain, ResponseValue::Number(2.0), therapist)
        .await
        .unwrap();
    engine.complete(instance.id, therapist, false).await.unwrap();
    engine.review(instance.id, supervisor).await.unwrap();
    let locked = engine.lock(instance.id, supervisor).await.unwrap();
    assert_eq!(locked.status, ChecklistStatus::Locked);
    assert_eq!(locked.locked_by, Some(supervisor));

    let finalized = |e: &EngineError| {
        matches!(
            e,
            EngineError::Finalized {
                status: ChecklistStatus::Locked
            }
        )
    };
    let err = engine
        .submit_response(instance.id, pain, ResponseValue::Number(5.0), therapist)
        .await
        .unwrap_err();
    assert!(finalized(&err), "{err:?}");
    let err = engine
        .skip_item(instance.id, pain, Some("x".to_string()), therapist)
        .await
        .unwrap_err();
    assert!(finalized(&err));
    let err = engine
        .submit_batch(instance.id, vec![(pain, ResponseValue::Number(1.0))], therapist)
        .await
        .unwrap_err();
    assert!(finalized(&err));
    let err = engine
        .delete_response(instance.id, pain, therapist)
        .await
        .unwrap_err();
    assert!(finalized(&err));
    let err = engine
        .save_draft(instance.id, Default::default())
        .await
        .unwrap_err();
    assert!(finalized(&err));
    let err = engine.generate_note(instance.id, therapist).await.unwrap_err();
    assert!(finalized(&err));

    // value unchanged
    let response = engine.get_response(instance.id, pain).await.unwrap();
    assert_eq!(response.value, Some(ResponseValue::Number(2.0)));
}

#[tokio::test]
async fn transitions_are_forward_only() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let actor = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), actor, template.id)
        .await
        .unwrap();

    // cannot skip ahead
    let err = engine.review(instance.id, actor).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: ChecklistStatus::InProgress,
            to: ChecklistStatus::Reviewed
        }
    ));
    let err = engine.lock(instance.id, actor).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    engine.complete(instance.id, actor, true).await.unwrap();
    engine.review(instance.id, actor).await.unwrap();

    // cannot go backward
    let err = engine.complete(instance.id, actor, true).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: ChecklistStatus::Reviewed,
            to: ChecklistStatus::Completed
        }
    ));
    let err = engine.abandon(instance.id, actor, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    engine.lock(instance.id, actor).await.unwrap();
    let err = engine.review(instance.id, actor).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: ChecklistStatus::Locked,
            ..
        }
    ));
}

#[tokio::test]
async fn completion_requires_threshold_or_acknowledgement() {
    let (engine, mut events) = engine_with_events();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let instance = engine
        .start_instance(patient, therapist, template.id)
        .await
        .unwrap();

    let err = engine.complete(instance.id, therapist, false).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Incomplete {
            progress: 0,
            threshold: 100
        }
    ));
    assert!(events.try_recv().is_err());

    let completed = engine.complete(instance.id, therapist, true).await.unwrap();
    assert_eq!(completed.status, ChecklistStatus::Completed);
    assert!(completed.acknowledged_incomplete);
    assert!(completed.completed_at.is_some());

    let event = events.try_recv().unwrap();
    assert_eq!(event.instance_id, instance.id);
    assert_eq!(event.patient_id, patient);
    assert_eq!(event.progress_percentage, 0);
    assert!(event.acknowledged_incomplete);
}

#[tokio::test]
async fn complete_instance_emits_final_progress() {
    let (engine, mut events) = engine_with_events();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    engine
        .submit_response(
            instance.id,
            item_id(&template, "pain"),
            ResponseValue::Number(7.0),
            therapist,
        )
        .await
        .unwrap();

    let completed = engine.complete(instance.id, therapist, false).await.unwrap();
    assert!(!completed.acknowledged_incomplete);
    assert_eq!(completed.progress_percentage, 100);
    assert_eq!(events.try_recv().unwrap().progress_percentage, 100);
}

#[tokio::test]
async fn completed_instance_still_accepts_corrections() {
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
    engine
        .submit_response(instance.id, pain, ResponseValue::Number(7.0), therapist)
        .await
        .unwrap();
    engine.complete(instance.id, therapist, false).await.unwrap();

    let corrected = engine
        .submit_response(instance.id, pain, ResponseValue::Number(6.0), therapist)
        .await
        .unwrap();
    assert_eq!(corrected.response_history.len(), 1);
}

#[tokio::test]
async fn abandon_records_reason_and_freezes_instance() {
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

    let abandoned = engine
        .abandon(instance.id, therapist, Some("  patient left early ".to_string()))
        .await
        .unwrap();
    assert_eq!(abandoned.status, ChecklistStatus::Abandoned);
    assert_eq!(abandoned.abandon_reason.as_deref(), Some("patient left early"));
    assert!(abandoned.abandoned_at.is_some());

    let err = engine
        .submit_response(
            instance.id,
            item_id(&template, "pain"),
            ResponseValue::Number(1.0),
            therapist,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Finalized {
            status: ChecklistStatus::Abandoned
        }
    ));
    let err = engine.generate_note(instance.id, therapist).await.unwrap_err();
    assert!(matches!(err, EngineError::Finalized { .. }));
}

#[tokio::test]
async fn note_generation_is_idempotent_and_goes_stale() {
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
    engine
        .submit_response(instance.id, pain, ResponseValue::Number(5.0), therapist)
        .await
        .unwrap();

    let first = engine.generate_note(instance.id, therapist).await.unwrap();
    let second = engine.generate_note(instance.id, therapist).await.unwrap();
    assert_eq!(first.note, second.note);
    assert_eq!(first.note_localized, second.note_localized);
    assert_eq!(
        engine.checklist(instance.id).await.unwrap().note_generation_status,
        NoteGenerationStatus::Completed
    );

    engine
        .submit_response(instance.id, pain, ResponseValue::Number(3.0), therapist)
        .await
        .unwrap();
    assert_eq!(
        engine.checklist(instance.id).await.unwrap().note_generation_status,
        NoteGenerationStatus::Stale
    );
    // stored note is kept until regenerated
    let stored = engine.get_generated_note(instance.id).await.unwrap();
    assert_eq!(stored.note, second.note);

    let third = engine.generate_note(instance.id, therapist).await.unwrap();
    assert_ne!(third.note, second.note);
    assert!(third.note.contains("pain: 3"));
}

#[tokio::test]
async fn generated_note_is_not_found_before_generation() {
    let (engine, _) = engine();
    let template = engine
        .publish_template(follow_up(Uuid::new_v4()))
        .await
        .unwrap();
    let instance = engine
        .start_instance(Uuid::new_v4(), Uuid::new_v4(), template.id)
        .await
        .unwrap();
    let err = engine.get_generated_note(instance.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "note", .. }));
}

#[tokio::test]
async fn reviewed_instance_can_still_regenerate_note() {
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
    engine
        .submit_response(
            instance.id,
            item_id(&template, "comment"),
            ResponseValue::Text {
                text: "walked without aid".to_string(),
                source: TextSource::Voice,
            },
            therapist,
        )
        .await
        .unwrap();
    engine.complete(instance.id, therapist, true).await.unwrap();
    engine.review(instance.id, Uuid::new_v4()).await.unwrap();

    let note = engine.generate_note(instance.id, therapist).await.unwrap();
    assert!(note.note.contains("comment: walked without aid"));
    assert!(note.note.contains("pain was not recorded"));
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let (engine, _) = engine();
    let err = engine.progress(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "checklist", .. }));
    let err = engine
        .complete(Uuid::new_v4(), Uuid::new_v4(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "checklist", .. }));
}

#[tokio::test]
async fn hidden_answer_does_not_keep_dependents_required() {
    let (engine, _) = engine();
    let mut draft = post_op(Uuid::new_v4());
    let mut wound_check = item("wound_check", InputConfig::YesNo, true);
    wound_check.display_conditions = Some(Condition::GreaterThan {
        field: "incision".to_string(),
        value: 5.0,
    });
    draft.sections[0].items.push(wound_check);
    let template = engine.publish_template(draft).await.unwrap();

    let therapist = Uuid::new_v4();
    let instance = engine
        .start_instance(Uuid::new_v4(), therapist, template.id)
        .await
        .unwrap();
    let surgery = item_id(&template, "surgery");
    let incision = item_id(&template, "incision");

    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(true), therapist)
        .await
        .unwrap();
    engine
        .submit_response(instance.id, incision, ResponseValue::Number(8.0), therapist)
        .await
        .unwrap();
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 3);
    assert_eq!(progress.resolved, 2);

    engine
        .submit_response(instance.id, surgery, ResponseValue::YesNo(false), therapist)
        .await
        .unwrap();
    let progress = engine.progress(instance.id).await.unwrap();
    assert_eq!(progress.required_visible, 1);
    assert_eq!(progress.percentage, 100);

    engine.complete(instance.id, therapist, false).await.unwrap();
    let kept = engine.get_response(instance.id, incision).await.unwrap();
    assert_eq!(kept.value, Some(ResponseValue::Number(8.0)));
}
