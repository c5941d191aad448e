use std::collections::BTreeMap;
use std::sync::Arc;

use kinesis_audit::events::{AuditEvent, CompletionEvent, Resource};
use kinesis_audit::sink::EventSink;
use kinesis_core::keys;
use kinesis_core::models::checklist::{
    ChecklistStatus, GeneratedNote, NoteGenerationStatus, PatientChecklistRef, VisitChecklist,
};
use kinesis_core::models::draft::{Draft, DraftSnapshot};
use kinesis_core::models::input::ResponseValue;
use kinesis_core::models::response::{Response, ResponseSet};
use kinesis_core::models::template::{Template, TemplateDraft, VisitType};
use kinesis_notes::generate::NoteInput;
use kinesis_notes::render::NoteGenerator;
use kinesis_rules::validation::validate_value;
use kinesis_storage::state::{create_state, load_state, save_state, try_load_state};
use kinesis_storage::store::ObjectStore;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::autosave::AutosaveCoordinator;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::{Pinned, ResponseLedger};
use crate::locks::InstanceLocks;
use crate::persist::modify;
use crate::progress::{ProgressReport, compute_progress};
use crate::templates::TemplateStore;

/// Everything a client needs to pick an encounter back up.
#[derive(Debug, Clone)]
pub struct Session {
    pub checklist: VisitChecklist,
    pub responses: ResponseSet,
    pub progress: ProgressReport,
    /// Unconfirmed input saved since the last commit, offered for
    /// acceptance or discard. Never merged automatically.
    pub draft: Option<Draft>,
}

/// Lifecycle of visit checklists: start, capture, complete, review, lock.
///
/// Every mutation of an instance runs under that instance's lock and
/// checks the instance status inside it.
pub struct ChecklistEngine<S: ObjectStore> {
    store: Arc<S>,
    templates: TemplateStore<S>,
    ledger: ResponseLedger<S>,
    autosave: AutosaveCoordinator,
    notes: NoteGenerator,
    sink: Arc<dyn EventSink>,
    locks: InstanceLocks,
    completion_threshold: u8,
}

impl<S: ObjectStore> ChecklistEngine<S> {
    /// Build an engine over `store`. Spawns the auto-save worker, so this
    /// must run inside a tokio runtime.
    pub fn new(
        store: Arc<S>,
        config: &EngineConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, EngineError> {
        let notes = NoteGenerator::new(
            &config.notes.primary_locale,
            &config.notes.secondary_locale,
        )?;
        Ok(Self {
            templates: TemplateStore::new(store.clone()),
            ledger: ResponseLedger::new(store.clone()),
            autosave: AutosaveCoordinator::spawn(store.clone(), config.autosave.clone()),
            notes,
            sink,
            locks: InstanceLocks::new(),
            completion_threshold: config.completion_threshold,
            store,
        })
    }

    pub fn templates(&self) -> &TemplateStore<S> {
        &self.templates
    }

    pub async fn publish_template(&self, draft: TemplateDraft) -> Result<Template, EngineError> {
        self.templates.publish_new_version(draft).await
    }

    pub async fn get_template(
        &self,
        code: &str,
        clinic_id: Uuid,
        visit_type: VisitType,
    ) -> Result<Template, EngineError> {
        self.templates.get_current(code, clinic_id, visit_type).await
    }

    // -- Instance lifecycle --------------------------------------------------

    /// Start a checklist pinned to `template_id`.
    ///
    /// The patient's most recent finalized instance of the same template
    /// code becomes the baseline, and auto-populated items are seeded into
    /// the first draft from it.
    pub async fn start_instance(
        &self,
        patient_id: Uuid,
        therapist_id: Uuid,
        template_id: Uuid,
    ) -> Result<VisitChecklist, EngineError> {
        let template = self.templates.get_with_tree(template_id).await?;
        if !template.is_current_version {
            info!(
                %template_id,
                code = %template.code,
                version = template.version,
                "starting checklist from a superseded template version"
            );
        }

        let (baseline_instance_id, baseline) = self.find_baseline(patient_id, &template.code).await?;

        let now = jiff::Timestamp::now();
        let id = Uuid::new_v4();
        // 100 when nothing is required up front.
        let initial_progress =
            compute_progress(&template, &ResponseSet::new(id), &baseline).percentage;
        let checklist = VisitChecklist {
            id,
            patient_id,
            therapist_id,
            clinic_id: template.clinic_id,
            template_id: template.id,
            template_code: template.code.clone(),
            template_version: template.version,
            visit_type: template.visit_type,
            status: ChecklistStatus::InProgress,
            progress_percentage: initial_progress,
            started_at: now,
            completed_at: None,
            acknowledged_incomplete: false,
            reviewed_at: None,
            reviewed_by: None,
            locked_at: None,
            locked_by: None,
            abandoned_at: None,
            abandon_reason: None,
            baseline_instance_id,
            baseline,
            note: None,
            note_generation_status: NoteGenerationStatus::NotGenerated,
            updated_at: now,
        };
        self.ledger.create(checklist.id).await?;
        create_state(&*self.store, &keys::checklist(checklist.id), &checklist).await?;
        save_state(
            &*self.store,
            &keys::patient_checklist(patient_id, checklist.id),
            &PatientChecklistRef {
                checklist_id: checklist.id,
                template_code: checklist.template_code.clone(),
                started_at: now,
            },
        )
        .await?;

        let seeded = auto_populate(&template, &checklist.baseline);
        if !seeded.is_empty() {
            self.autosave.save(
                checklist.id,
                DraftSnapshot {
                    responses: seeded,
                    ui_state: serde_json::Value::Null,
                },
            );
        }

        AuditEvent::new("checklist.started", Resource::Checklist, checklist.id, therapist_id)
            .with_details(json!({
                "patient_id": patient_id,
                "template_id": template.id,
                "template_version": template.version,
                "baseline_instance_id": baseline_instance_id,
            }))
            .emit();

        Ok(checklist)
    }

    pub async fn checklist(&self, instance_id: Uuid) -> Result<VisitChecklist, EngineError> {
        let (checklist, _) = load_state::<S, VisitChecklist>(&*self.store, &keys::checklist(instance_id))
            .await
            .map_err(EngineError::from_storage("checklist", instance_id))?;
        Ok(checklist)
    }

    /// Move `in_progress → completed`.
    ///
    /// Progress must reach the configured threshold unless the caller
    /// acknowledges completing an incomplete checklist. Emits a
    /// [`CompletionEvent`] to the configured sink.
    pub async fn complete(
        &self,
        instance_id: Uuid,
        actor: Uuid,
        acknowledged_incomplete: bool,
    ) -> Result<VisitChecklist, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.checklist(instance_id).await?;
        if !checklist.status.can_transition_to(ChecklistStatus::Completed) {
            return Err(EngineError::InvalidTransition {
                from: checklist.status,
                to: ChecklistStatus::Completed,
            });
        }

        let template = self.pinned_template(&checklist).await?;
        let responses = self.ledger.responses(instance_id).await?;
        let progress = compute_progress(&template, &responses, &checklist.baseline);
        let below_threshold = progress.percentage < self.completion_threshold;
        if below_threshold && !acknowledged_incomplete {
            return Err(EngineError::Incomplete {
                progress: progress.percentage,
                threshold: self.completion_threshold,
            });
        }

        let (completed, ()) = self
            .modify_checklist(instance_id, |c| {
                c.transition_to(ChecklistStatus::Completed, actor)?;
                c.progress_percentage = progress.percentage;
                c.acknowledged_incomplete = below_threshold;
                Ok(())
            })
            .await?;

        AuditEvent::new("checklist.completed", Resource::Checklist, instance_id, actor)
            .with_details(json!({
                "progress_percentage": progress.percentage,
                "acknowledged_incomplete": below_threshold,
            }))
            .emit();

        let event = CompletionEvent {
            instance_id,
            patient_id: completed.patient_id,
            therapist_id: completed.therapist_id,
            template_code: completed.template_code.clone(),
            progress_percentage: progress.percentage,
            acknowledged_incomplete: below_threshold,
            completed_at: completed.completed_at.unwrap_or(completed.updated_at),
        };
        if let Err(e) = self.sink.completed(&event) {
            warn!(%instance_id, error = %e, "completion event delivery failed");
        }

        Ok(completed)
    }

    /// Supervisor sign-off, `completed → reviewed`.
    pub async fn review(&self, instance_id: Uuid, reviewer: Uuid) -> Result<VisitChecklist, EngineError> {
        self.transition(instance_id, ChecklistStatus::Reviewed, reviewer, None)
            .await
    }

    /// `reviewed → locked`. The record is final afterwards.
    pub async fn lock(&self, instance_id: Uuid, supervisor: Uuid) -> Result<VisitChecklist, EngineError> {
        self.transition(instance_id, ChecklistStatus::Locked, supervisor, None)
            .await
    }

    pub async fn abandon(
        &self,
        instance_id: Uuid,
        actor: Uuid,
        reason: Option<String>,
    ) -> Result<VisitChecklist, EngineError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.transition(instance_id, ChecklistStatus::Abandoned, actor, reason)
            .await
    }

    async fn transition(
        &self,
        instance_id: Uuid,
        next: ChecklistStatus,
        actor: Uuid,
        abandon_reason: Option<String>,
    ) -> Result<VisitChecklist, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let (checklist, from) = self
            .modify_checklist(instance_id, |c| {
                let from = c.status;
                c.transition_to(next, actor)?;
                if next == ChecklistStatus::Abandoned {
                    c.abandon_reason = abandon_reason.clone();
                }
                Ok(from)
            })
            .await?;

        info!(%instance_id, %from, to = %next, "checklist transitioned");
        AuditEvent::new(format!("checklist.{next}"), Resource::Checklist, instance_id, actor)
            .with_details(json!({ "from": from, "reason": checklist.abandon_reason }))
            .emit();
        Ok(checklist)
    }

    // -- Responses -------------------------------------------------------------

    pub async fn submit_response(
        &self,
        instance_id: Uuid,
        item_id: Uuid,
        value: ResponseValue,
        author: Uuid,
    ) -> Result<Response, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.writable_checklist(instance_id).await?;
        let template = self.pinned_template(&checklist).await?;
        let pinned = Pinned {
            template: &template,
            baseline: &checklist.baseline,
        };

        let write = self
            .ledger
            .upsert(pinned, instance_id, item_id, value, author)
            .await?;
        self.after_mutation(instance_id, &template, &write.responses)
            .await?;
        Ok(write.output)
    }

    /// Commit several values at once; all or none.
    pub async fn submit_batch(
        &self,
        instance_id: Uuid,
        entries: Vec<(Uuid, ResponseValue)>,
        author: Uuid,
    ) -> Result<Vec<Response>, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.writable_checklist(instance_id).await?;
        let template = self.pinned_template(&checklist).await?;
        self.commit_batch(&checklist, &template, entries, author)
            .await
    }

    pub async fn skip_item(
        &self,
        instance_id: Uuid,
        item_id: Uuid,
        reason: Option<String>,
        author: Uuid,
    ) -> Result<Response, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.writable_checklist(instance_id).await?;
        let template = self.pinned_template(&checklist).await?;
        let pinned = Pinned {
            template: &template,
            baseline: &checklist.baseline,
        };

        let write = self
            .ledger
            .skip(pinned, instance_id, item_id, reason, author)
            .await?;
        self.after_mutation(instance_id, &template, &write.responses)
            .await?;
        Ok(write.output)
    }

    /// Hard-delete an erroneous response. Refused once a generated note
    /// references it; corrections then go through [`Self::submit_response`].
    pub async fn delete_response(
        &self,
        instance_id: Uuid,
        item_id: Uuid,
        actor: Uuid,
    ) -> Result<Response, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.writable_checklist(instance_id).await?;
        if checklist.note_references(item_id) {
            return Err(EngineError::ResponseReferenced { item_id });
        }
        let template = self.pinned_template(&checklist).await?;

        let write = self.ledger.delete(instance_id, item_id).await?;
        self.after_mutation(instance_id, &template, &write.responses)
            .await?;

        AuditEvent::new("response.deleted", Resource::Response, write.output.id, actor)
            .with_details(json!({
                "instance_id": instance_id,
                "item_id": item_id,
                "history_entries": write.output.response_history.len(),
            }))
            .emit();
        Ok(write.output)
    }

    pub async fn get_response(&self, instance_id: Uuid, item_id: Uuid) -> Result<Response, EngineError> {
        self.ledger.get(instance_id, item_id).await
    }

    pub async fn responses(&self, instance_id: Uuid) -> Result<ResponseSet, EngineError> {
        self.ledger.responses(instance_id).await
    }

    /// Recompute progress from the current ledger.
    pub async fn progress(&self, instance_id: Uuid) -> Result<ProgressReport, EngineError> {
        let checklist = self.checklist(instance_id).await?;
        let template = self.pinned_template(&checklist).await?;
        let responses = self.ledger.responses(instance_id).await?;
        Ok(compute_progress(&template, &responses, &checklist.baseline))
    }

    // -- Drafts ----------------------------------------------------------------

    /// Queue a draft snapshot. Returns once queued; the write happens in
    /// the background.
    pub async fn save_draft(&self, instance_id: Uuid, snapshot: DraftSnapshot) -> Result<u64, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        self.writable_checklist(instance_id).await?;
        Ok(self.autosave.save(instance_id, snapshot))
    }

    pub async fn resume(&self, instance_id: Uuid) -> Result<Session, EngineError> {
        self.autosave.flush().await;
        let checklist = self.checklist(instance_id).await?;
        let template = self.pinned_template(&checklist).await?;
        let responses = self.ledger.responses(instance_id).await?;
        let progress = compute_progress(&template, &responses, &checklist.baseline);
        let draft = try_load_state::<S, Draft>(&*self.store, &keys::draft(instance_id))
            .await?
            .map(|(draft, _)| draft);

        Ok(Session {
            checklist,
            responses,
            progress,
            draft,
        })
    }

    /// Promote the pending draft into committed responses and clear it.
    ///
    /// Draft values equal to the committed value are not rewritten. If any
    /// value fails validation nothing is committed and the draft is kept.
    /// Only the accepted draft is cleared; a newer one saved meanwhile is
    /// offered on the next resume.
    pub async fn accept_draft(&self, instance_id: Uuid, author: Uuid) -> Result<Vec<Response>, EngineError> {
        self.autosave.flush().await;
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.writable_checklist(instance_id).await?;
        let (draft, _) = try_load_state::<S, Draft>(&*self.store, &keys::draft(instance_id))
            .await?
            .ok_or_else(|| EngineError::not_found("draft", instance_id))?;

        let committed = self.ledger.responses(instance_id).await?;
        let entries: Vec<(Uuid, ResponseValue)> = draft
            .snapshot
            .responses
            .into_iter()
            .filter(|(item_id, value)| {
                committed
                    .get(*item_id)
                    .and_then(|r| r.answered_value())
                    != Some(value)
            })
            .collect();

        let accepted = if entries.is_empty() {
            Vec::new()
        } else {
            let template = self.pinned_template(&checklist).await?;
            self.commit_batch(&checklist, &template, entries, author)
                .await?
        };
        // A draft saved after the one accepted here stays pending.
        self.autosave
            .discard_up_to(instance_id, draft.sequence)
            .await?;

        AuditEvent::new("draft.accepted", Resource::Checklist, instance_id, author)
            .with_details(json!({
                "sequence": draft.sequence,
                "committed": accepted.len(),
            }))
            .emit();
        Ok(accepted)
    }

    pub async fn discard_draft(&self, instance_id: Uuid, actor: Uuid) -> Result<(), EngineError> {
        self.checklist(instance_id).await?;
        self.autosave.discard(instance_id).await?;
        AuditEvent::new("draft.discarded", Resource::Checklist, instance_id, actor).emit();
        Ok(())
    }

    // -- Notes -------------------------------------------------------------------

    /// Render and store the clinical note. Regenerating replaces the
    /// previous note; the replacement is audited.
    pub async fn generate_note(&self, instance_id: Uuid, actor: Uuid) -> Result<GeneratedNote, EngineError> {
        let _guard = self.locks.acquire(instance_id).await;
        let checklist = self.checklist(instance_id).await?;
        if !checklist.status.accepts_note() {
            return Err(EngineError::Finalized {
                status: checklist.status,
            });
        }
        let template = self.pinned_template(&checklist).await?;
        let responses = self.ledger.responses(instance_id).await?;

        let rendered = self.notes.generate(&NoteInput {
            template: &template,
            responses: &responses,
            baseline: &checklist.baseline,
        })?;
        let note = GeneratedNote {
            note: rendered.note,
            note_localized: rendered.note_localized,
            referenced_items: rendered.referenced_items,
            generated_at: jiff::Timestamp::now(),
            generated_by: actor,
        };

        let (_, superseded) = self
            .modify_checklist(instance_id, |c| {
                if !c.status.accepts_note() {
                    return Err(EngineError::Finalized { status: c.status });
                }
                let superseded = c.note.replace(note.clone());
                c.note_generation_status = NoteGenerationStatus::Completed;
                c.updated_at = note.generated_at;
                Ok(superseded)
            })
            .await?;

        match superseded {
            Some(previous) => AuditEvent::new("note.regenerated", Resource::Checklist, instance_id, actor)
                .with_details(json!({
                    "superseded_generated_at": previous.generated_at,
                    "superseded_generated_by": previous.generated_by,
                    "unchanged": previous.note == note.note
                        && previous.note_localized == note.note_localized,
                }))
                .emit(),
            None => AuditEvent::new("note.generated", Resource::Checklist, instance_id, actor)
                .with_details(json!({ "referenced_items": note.referenced_items.len() }))
                .emit(),
        }

        Ok(note)
    }

    pub async fn get_generated_note(&self, instance_id: Uuid) -> Result<GeneratedNote, EngineError> {
        self.checklist(instance_id)
            .await?
            .note
            .ok_or_else(|| EngineError::not_found("note", instance_id))
    }

    /// Stop the auto-save worker after draining queued drafts.
    pub async fn shutdown(self) {
        self.autosave.shutdown().await;
    }

    // -- Internals -----------------------------------------------------------

    async fn writable_checklist(&self, instance_id: Uuid) -> Result<VisitChecklist, EngineError> {
        let checklist = self.checklist(instance_id).await?;
        if !checklist.status.accepts_responses() {
            return Err(EngineError::Finalized {
                status: checklist.status,
            });
        }
        Ok(checklist)
    }

    async fn pinned_template(&self, checklist: &VisitChecklist) -> Result<Template, EngineError> {
        self.templates.get_with_tree(checklist.template_id).await
    }

    async fn commit_batch(
        &self,
        checklist: &VisitChecklist,
        template: &Template,
        entries: Vec<(Uuid, ResponseValue)>,
        author: Uuid,
    ) -> Result<Vec<Response>, EngineError> {
        let pinned = Pinned {
            template,
            baseline: &checklist.baseline,
        };
        let write = self
            .ledger
            .upsert_batch(pinned, checklist.id, entries, author)
            .await?;
        self.after_mutation(checklist.id, template, &write.responses)
            .await?;
        Ok(write.output)
    }

    /// Refresh the progress hint and mark an existing note stale.
    async fn after_mutation(
        &self,
        instance_id: Uuid,
        template: &Template,
        responses: &ResponseSet,
    ) -> Result<(), EngineError> {
        self.modify_checklist(instance_id, |c| {
            c.progress_percentage = compute_progress(template, responses, &c.baseline).percentage;
            if c.note_generation_status == NoteGenerationStatus::Completed {
                c.note_generation_status = NoteGenerationStatus::Stale;
                info!(%instance_id, "generated note is now stale");
            }
            c.updated_at = jiff::Timestamp::now();
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn modify_checklist<R>(
        &self,
        instance_id: Uuid,
        apply: impl FnMut(&mut VisitChecklist) -> Result<R, EngineError>,
    ) -> Result<(VisitChecklist, R), EngineError> {
        modify(
            &*self.store,
            &keys::checklist(instance_id),
            ("checklist", instance_id.to_string()),
            apply,
        )
        .await
    }

    /// Values of the most recent finalized instance of `code` for the
    /// patient, keyed by item key.
    async fn find_baseline(
        &self,
        patient_id: Uuid,
        code: &str,
    ) -> Result<(Option<Uuid>, BTreeMap<String, ResponseValue>), EngineError> {
        let index_keys = self
            .store
            .list(&keys::patient_checklists_prefix(patient_id))
            .await?;
        let mut prior = Vec::new();
        for key in index_keys {
            let (entry, _) = load_state::<S, PatientChecklistRef>(&*self.store, &key).await?;
            if entry.template_code == code {
                prior.push(entry);
            }
        }
        prior.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        for entry in prior {
            let Some((instance, _)) = try_load_state::<S, VisitChecklist>(
                &*self.store,
                &keys::checklist(entry.checklist_id),
            )
            .await?
            else {
                warn!(checklist_id = %entry.checklist_id, "patient index points at a missing checklist");
                continue;
            };
            if !matches!(
                instance.status,
                ChecklistStatus::Completed | ChecklistStatus::Reviewed | ChecklistStatus::Locked
            ) {
                continue;
            }
            let responses = self.ledger.responses(instance.id).await?;
            let baseline = responses
                .responses
                .values()
                .filter_map(|r| r.answered_value().map(|v| (r.item_key.clone(), v.clone())))
                .collect();
            return Ok((Some(instance.id), baseline));
        }
        Ok((None, BTreeMap::new()))
    }
}

/// Draft values for auto-populated items, taken from the baseline. Values
/// that no longer fit the item's input are left out.
fn auto_populate(
    template: &Template,
    baseline: &BTreeMap<String, ResponseValue>,
) -> BTreeMap<Uuid, ResponseValue> {
    template
        .items()
        .filter(|(_, item)| item.auto_populate)
        .filter_map(|(_, item)| {
            let source = item.auto_populate_source.as_deref().unwrap_or(&item.key);
            let value = baseline.get(source)?;
            validate_value(item, value).ok()?;
            Some((item.id, value.clone()))
        })
        .collect()
}
