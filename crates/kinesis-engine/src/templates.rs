use std::collections::HashSet;
use std::sync::Arc;

use kinesis_audit::events::{AuditEvent, Resource};
use kinesis_core::keys;
use kinesis_core::models::template::{Template, TemplateDraft, TemplateHead, VisitType};
use kinesis_rules::schema::{check_draft, is_valid_identifier};
use kinesis_storage::error::StorageError;
use kinesis_storage::state::{create_state, load_state, save_state, save_state_if_match, try_load_state};
use kinesis_storage::store::ObjectStore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Versioned template persistence.
///
/// Published versions are immutable documents. The current version of a
/// `(clinic, code)` pair is named by a head document; replacing the head
/// under compare-and-swap is what makes a publication take effect.
pub struct TemplateStore<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> TemplateStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load a template version with its full section and item tree.
    ///
    /// `is_current_version` reflects the head at read time, so a stale flag
    /// left on a superseded document is never reported.
    pub async fn get_with_tree(&self, id: Uuid) -> Result<Template, EngineError> {
        let (mut template, _) = load_state::<S, Template>(&*self.store, &keys::template(id))
            .await
            .map_err(EngineError::from_storage("template", id))?;
        let head = self.head(template.clinic_id, &template.code).await?;
        template.is_current_version = head.is_some_and(|(h, _)| h.template_id == template.id);
        Ok(template)
    }

    pub async fn get_current(
        &self,
        code: &str,
        clinic_id: Uuid,
        visit_type: VisitType,
    ) -> Result<Template, EngineError> {
        let not_found = || EngineError::not_found("template", format!("{clinic_id}/{code}/{visit_type}"));
        // Published codes are always valid identifiers; anything else would
        // only be spliced into a storage key.
        if !is_valid_identifier(code) {
            return Err(not_found());
        }
        let (head, _) = self.head(clinic_id, code).await?.ok_or_else(not_found)?;
        if head.visit_type != visit_type {
            return Err(not_found());
        }
        self.get_with_tree(head.template_id).await
    }

    /// Publish `draft` as the next version of its code.
    ///
    /// Section and item ids are freshly assigned; item keys carry over. The
    /// previous version is left untouched apart from its current flag.
    pub async fn publish_new_version(&self, draft: TemplateDraft) -> Result<Template, EngineError> {
        check_draft(&draft).map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let head_key = keys::template_head(draft.clinic_id, &draft.code);
        let existing = self.head(draft.clinic_id, &draft.code).await?;

        if let Some((head, _)) = &existing
            && head.visit_type != draft.visit_type
        {
            return Err(EngineError::InvalidInput(format!(
                "template code '{}' is already active as {}, cannot publish as {}",
                draft.code, head.visit_type, draft.visit_type
            )));
        }

        let (version, previous_version_id) = match &existing {
            Some((head, _)) => (head.version + 1, Some(head.template_id)),
            None => (1, None),
        };

        let now = jiff::Timestamp::now();
        let mut sections = draft.sections;
        sections.sort_by_key(|s| s.sort_order);
        for section in &mut sections {
            section.id = Uuid::new_v4();
            section.items.sort_by_key(|i| i.sort_order);
            for item in &mut section.items {
                item.id = Uuid::new_v4();
            }
        }

        let template = Template {
            id: Uuid::new_v4(),
            code: draft.code,
            clinic_id: draft.clinic_id,
            name: draft.name,
            visit_type: draft.visit_type,
            diagnosis_filter: draft.diagnosis_filter,
            version,
            is_current_version: true,
            previous_version_id,
            sections,
            published_at: now,
            published_by: draft.author,
        };
        create_state(&*self.store, &keys::template(template.id), &template).await?;

        let head = TemplateHead {
            clinic_id: template.clinic_id,
            code: template.code.clone(),
            visit_type: template.visit_type,
            template_id: template.id,
            version,
            updated_at: now,
        };
        // Commit point. A concurrent publication of the same code loses here
        // and its version document is never reachable from the head.
        match &existing {
            Some((_, etag)) => save_state_if_match(&*self.store, &head_key, &head, etag).await?,
            None => create_state(&*self.store, &head_key, &head).await?,
        };

        if let Some(previous_id) = previous_version_id {
            self.clear_current_flag(previous_id).await;
        }

        info!(
            template_id = %template.id,
            code = %template.code,
            version,
            "template published"
        );
        AuditEvent::new("template.published", Resource::Template, template.id, template.published_by)
            .with_details(serde_json::json!({
                "code": template.code,
                "version": version,
                "previous_version_id": previous_version_id,
            }))
            .emit();

        Ok(template)
    }

    /// All versions of the template's code up to `template_id`, newest first.
    pub async fn version_history(&self, template_id: Uuid) -> Result<Vec<Template>, EngineError> {
        let mut history = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(template_id);
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(EngineError::InvalidInput(format!(
                    "template {template_id} has a cyclic version chain"
                )));
            }
            let template = self.get_with_tree(id).await?;
            next = template.previous_version_id;
            history.push(template);
        }
        Ok(history)
    }

    /// Current heads of every template code in a clinic, sorted by code.
    pub async fn list_current(&self, clinic_id: Uuid) -> Result<Vec<TemplateHead>, EngineError> {
        let head_keys = self.store.list(&keys::template_heads_prefix(clinic_id)).await?;
        let mut heads = Vec::with_capacity(head_keys.len());
        for key in head_keys {
            let (head, _) = load_state::<S, TemplateHead>(&*self.store, &key).await?;
            heads.push(head);
        }
        heads.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(heads)
    }

    async fn head(
        &self,
        clinic_id: Uuid,
        code: &str,
    ) -> Result<Option<(TemplateHead, String)>, EngineError> {
        Ok(try_load_state(&*self.store, &keys::template_head(clinic_id, code)).await?)
    }

    /// Best effort; reads reconcile the flag against the head regardless.
    async fn clear_current_flag(&self, id: Uuid) {
        if let Err(e) = self.try_clear_current_flag(id).await {
            warn!(template_id = %id, error = %e, "failed to clear current flag on superseded version");
        }
    }

    async fn try_clear_current_flag(&self, id: Uuid) -> Result<(), StorageError> {
        let key = keys::template(id);
        let (mut previous, _) = load_state::<S, Template>(&*self.store, &key).await?;
        previous.is_current_version = false;
        save_state(&*self.store, &key, &previous).await?;
        Ok(())
    }
}
