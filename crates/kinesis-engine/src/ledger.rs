use std::collections::BTreeMap;
use std::sync::Arc;

use kinesis_core::keys;
use kinesis_core::models::input::ResponseValue;
use kinesis_core::models::response::{Response, ResponseSet};
use kinesis_core::models::rules::AlertSeverity;
use kinesis_core::models::template::{Item, Template};
use kinesis_rules::alerts::evaluate_alerts;
use kinesis_rules::snapshot::ResponseSnapshot;
use kinesis_rules::validation::{validate_skip, validate_value};
use kinesis_rules::visibility::{item_states, resolve};
use kinesis_storage::state::{create_state, load_state};
use kinesis_storage::store::ObjectStore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::persist::modify;

/// The template version and baseline an instance was pinned to at start.
#[derive(Clone, Copy)]
pub struct Pinned<'a> {
    pub template: &'a Template,
    pub baseline: &'a BTreeMap<String, ResponseValue>,
}

impl<'a> Pinned<'a> {
    fn item(&self, item_id: Uuid) -> Result<&'a Item, EngineError> {
        self.template
            .item(item_id)
            .map(|(_, item)| item)
            .ok_or_else(|| EngineError::not_found("item", item_id))
    }
}

/// A committed write and the ledger exactly as it was written.
#[derive(Debug, Clone)]
pub struct LedgerWrite<T> {
    pub output: T,
    pub responses: ResponseSet,
}

/// Committed responses of each instance, one document per instance.
///
/// Every write is a single compare-and-swap of that document, so a batch
/// commits entirely or not at all and readers always see one consistent
/// snapshot.
pub struct ResponseLedger<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> ResponseLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, instance_id: Uuid) -> Result<(), EngineError> {
        create_state(&*self.store, &keys::responses(instance_id), &ResponseSet::new(instance_id))
            .await?;
        Ok(())
    }

    /// Record `value` for an item, archiving the previous state in history.
    pub async fn upsert(
        &self,
        pinned: Pinned<'_>,
        instance_id: Uuid,
        item_id: Uuid,
        value: ResponseValue,
        author: Uuid,
    ) -> Result<LedgerWrite<Response>, EngineError> {
        let item = pinned.item(item_id)?;
        validate_value(item, &value)?;

        let (responses, response) = modify(
            &*self.store,
            &keys::responses(instance_id),
            ("checklist", instance_id.to_string()),
            |set: &mut ResponseSet| {
                record(set, item, author, |r| r.record_value(value.clone(), author));
                Ok(refresh_alerts(set, pinned, item, author))
            },
        )
        .await?;

        debug!(%instance_id, %item_id, history = response.response_history.len(), "response upserted");
        Ok(LedgerWrite {
            output: response,
            responses,
        })
    }

    /// Apply several values as one write. Every value is validated first;
    /// if any fails nothing is written.
    pub async fn upsert_batch(
        &self,
        pinned: Pinned<'_>,
        instance_id: Uuid,
        entries: Vec<(Uuid, ResponseValue)>,
        author: Uuid,
    ) -> Result<LedgerWrite<Vec<Response>>, EngineError> {
        let mut checked = Vec::with_capacity(entries.len());
        for (item_id, value) in entries {
            let item = pinned.item(item_id)?;
            validate_value(item, &value)?;
            checked.push((item, value));
        }

        let (responses, written) = modify(
            &*self.store,
            &keys::responses(instance_id),
            ("checklist", instance_id.to_string()),
            |set: &mut ResponseSet| {
                for (item, value) in &checked {
                    record(set, item, author, |r| r.record_value(value.clone(), author));
                }
                Ok(checked
                    .iter()
                    .map(|(item, _)| refresh_alerts(set, pinned, item, author))
                    .collect::<Vec<_>>())
            },
        )
        .await?;

        debug!(%instance_id, count = written.len(), "response batch committed");
        Ok(LedgerWrite {
            output: written,
            responses,
        })
    }

    /// Mark an item skipped. A reason is required when the item is
    /// currently required.
    pub async fn skip(
        &self,
        pinned: Pinned<'_>,
        instance_id: Uuid,
        item_id: Uuid,
        reason: Option<String>,
        author: Uuid,
    ) -> Result<LedgerWrite<Response>, EngineError> {
        let item = pinned.item(item_id)?;
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

        let (responses, response) = modify(
            &*self.store,
            &keys::responses(instance_id),
            ("checklist", instance_id.to_string()),
            |set: &mut ResponseSet| {
                let required_now = {
                    let snapshot = ResponseSnapshot::new(set, pinned.baseline);
                    item_states(pinned.template, &snapshot)
                        .iter()
                        .any(|s| s.item.id == item.id && s.required)
                };
                validate_skip(item, required_now, reason.as_deref())?;
                record(set, item, author, |r| r.record_skip(reason.clone(), author));
                Ok(refresh_alerts(set, pinned, item, author))
            },
        )
        .await?;

        debug!(%instance_id, %item_id, "item skipped");
        Ok(LedgerWrite {
            output: response,
            responses,
        })
    }

    /// Hard-remove a response. Callers enforce that no note references it.
    pub async fn delete(
        &self,
        instance_id: Uuid,
        item_id: Uuid,
    ) -> Result<LedgerWrite<Response>, EngineError> {
        let (responses, removed) = modify(
            &*self.store,
            &keys::responses(instance_id),
            ("checklist", instance_id.to_string()),
            |set: &mut ResponseSet| {
                set.responses
                    .remove(&item_id)
                    .ok_or_else(|| EngineError::not_found("response", item_id))
            },
        )
        .await?;

        Ok(LedgerWrite {
            output: removed,
            responses,
        })
    }

    pub async fn responses(&self, instance_id: Uuid) -> Result<ResponseSet, EngineError> {
        let (set, _) = load_state::<S, ResponseSet>(&*self.store, &keys::responses(instance_id))
            .await
            .map_err(EngineError::from_storage("checklist", instance_id))?;
        Ok(set)
    }

    pub async fn get(&self, instance_id: Uuid, item_id: Uuid) -> Result<Response, EngineError> {
        let mut set = self.responses(instance_id).await?;
        set.responses
            .remove(&item_id)
            .ok_or_else(|| EngineError::not_found("response", item_id))
    }
}

fn record(set: &mut ResponseSet, item: &Item, author: Uuid, apply: impl FnOnce(&mut Response)) {
    let instance_id = set.instance_id;
    let response = set
        .responses
        .entry(item.id)
        .or_insert_with(|| Response::new(instance_id, item.id, item.key.clone(), author));
    apply(response);
}

/// Re-evaluate the item's decision rules against the visible post-write values
/// and store the result on its response. Returns the updated response.
fn refresh_alerts(set: &mut ResponseSet, pinned: Pinned<'_>, item: &Item, author: Uuid) -> Response {
    let alerts = {
        let committed = ResponseSnapshot::new(set, pinned.baseline);
        evaluate_alerts(item, &resolve(pinned.template, &committed).snapshot)
    };
    for alert in alerts.iter().filter(|a| a.severity == AlertSeverity::Critical) {
        warn!(
            instance_id = %set.instance_id,
            item_key = %item.key,
            rule_id = %alert.rule_id,
            "critical decision-support alert triggered"
        );
    }
    let instance_id = set.instance_id;
    let response = set
        .responses
        .entry(item.id)
        .or_insert_with(|| Response::new(instance_id, item.id, item.key.clone(), author));
    response.triggered_alerts = alerts;
    response.clone()
}
