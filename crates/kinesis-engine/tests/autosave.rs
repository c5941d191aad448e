use std::collections::BTreeMap;
use std::sync::Arc;

use kinesis_core::keys;
use kinesis_core::models::draft::{Draft, DraftSnapshot};
use kinesis_engine::autosave::AutosaveCoordinator;
use kinesis_engine::config::AutosaveConfig;
use kinesis_storage::memory::MemoryStore;
use kinesis_storage::state::try_load_state;
use serde_json::json;
use uuid::Uuid;

fn coordinator() -> (AutosaveCoordinator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = AutosaveConfig {
        max_retries: 1,
        retry_backoff_ms: 1,
    };
    (AutosaveCoordinator::spawn(store.clone(), config), store)
}

fn snapshot(scroll: u32) -> DraftSnapshot {
    DraftSnapshot {
        responses: BTreeMap::new(),
        ui_state: json!({ "scroll": scroll }),
    }
}

async fn stored(store: &MemoryStore, instance_id: Uuid) -> Option<Draft> {
    try_load_state::<MemoryStore, Draft>(store, &keys::draft(instance_id))
        .await
        .unwrap()
        .map(|(draft, _)| draft)
}

#[tokio::test]
async fn bounded_discard_keeps_newer_queued_save() {
    let (autosave, store) = coordinator();
    let instance_id = Uuid::new_v4();

    let accepted = autosave.save(instance_id, snapshot(1));
    autosave.flush().await;
    let newer = autosave.save(instance_id, snapshot(2));
    autosave.discard_up_to(instance_id, accepted).await.unwrap();
    autosave.flush().await;

    let draft = stored(&store, instance_id).await.unwrap();
    assert_eq!(draft.sequence, newer);
    assert_eq!(draft.snapshot.ui_state["scroll"], 2);
    autosave.shutdown().await;
}

#[tokio::test]
async fn bounded_discard_keeps_newer_written_draft() {
    let (autosave, store) = coordinator();
    let instance_id = Uuid::new_v4();

    let accepted = autosave.save(instance_id, snapshot(1));
    let newer = autosave.save(instance_id, snapshot(2));
    autosave.flush().await;
    autosave.discard_up_to(instance_id, accepted).await.unwrap();

    assert_eq!(stored(&store, instance_id).await.unwrap().sequence, newer);
    autosave.shutdown().await;
}

#[tokio::test]
async fn bounded_discard_removes_accepted_draft() {
    let (autosave, store) = coordinator();
    let instance_id = Uuid::new_v4();

    let accepted = autosave.save(instance_id, snapshot(1));
    autosave.flush().await;
    autosave.discard_up_to(instance_id, accepted).await.unwrap();

    assert!(stored(&store, instance_id).await.is_none());
    autosave.shutdown().await;
}

#[tokio::test]
async fn discard_drops_saves_queued_before_it() {
    let (autosave, store) = coordinator();
    let instance_id = Uuid::new_v4();
    let other = Uuid::new_v4();

    autosave.save(instance_id, snapshot(1));
    autosave.save(other, snapshot(7));
    autosave.discard(instance_id).await.unwrap();
    autosave.flush().await;

    assert!(stored(&store, instance_id).await.is_none());
    assert_eq!(stored(&store, other).await.unwrap().snapshot.ui_state["scroll"], 7);
    autosave.shutdown().await;
}
