use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use kinesis_core::keys;
use kinesis_core::models::draft::{Draft, DraftSnapshot};
use kinesis_storage::error::StorageError;
use kinesis_storage::state::{save_state, try_load_state};
use kinesis_storage::store::ObjectStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::AutosaveConfig;
use crate::error::EngineError;

enum Command {
    Save(Draft),
    /// Drop the instance's drafts with a sequence of at most `up_to`.
    Discard {
        instance_id: Uuid,
        up_to: u64,
        done: oneshot::Sender<Result<(), StorageError>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Background writer for draft snapshots.
///
/// Saves are queued and return immediately. A single worker drains the
/// queue in order, so drafts of one instance are never written out of
/// order; saves queued behind a newer save of the same instance are
/// dropped. Write failures are retried with backoff and logged, never
/// reported to the caller.
pub struct AutosaveCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    sequence: AtomicU64,
    worker: JoinHandle<()>,
}

impl AutosaveCoordinator {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn spawn<S: ObjectStore>(store: Arc<S>, config: AutosaveConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(store, rx, config));
        Self {
            tx,
            sequence: AtomicU64::new(0),
            worker,
        }
    }

    /// Queue a draft for `instance_id`. Returns the draft's sequence number.
    pub fn save(&self, instance_id: Uuid, snapshot: DraftSnapshot) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let draft = Draft {
            instance_id,
            sequence,
            saved_at: jiff::Timestamp::now(),
            snapshot,
        };
        if self.tx.send(Command::Save(draft)).is_err() {
            error!(%instance_id, sequence, "autosave worker has stopped, draft dropped");
        }
        sequence
    }

    /// Wait until every save queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_err() {
            warn!("autosave worker has stopped, nothing to flush");
            return;
        }
        let _ = wait.await;
    }

    /// Delete every draft of the instance saved before this call.
    pub async fn discard(&self, instance_id: Uuid) -> Result<(), EngineError> {
        let up_to = self.sequence.load(Ordering::SeqCst);
        self.discard_up_to(instance_id, up_to).await
    }

    /// Delete the instance's drafts numbered `up_to` or lower. A newer draft,
    /// queued or already written, is kept.
    pub async fn discard_up_to(&self, instance_id: Uuid, up_to: u64) -> Result<(), EngineError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Command::Discard {
                instance_id,
                up_to,
                done,
            })
            .map_err(|_| EngineError::AutosaveStopped)?;
        let result = wait.await.map_err(|_| EngineError::AutosaveStopped)?;
        Ok(result?)
    }

    /// Drain the queue and stop the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(error = %e, "autosave worker panicked");
        }
    }
}

async fn run<S: ObjectStore>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    config: AutosaveConfig,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        // Keep only the newest save per instance. A discard cancels queued
        // saves up to its sequence; newer saves still land.
        let mut latest: BTreeMap<Uuid, Draft> = BTreeMap::new();
        let mut discards = Vec::new();
        let mut flushes = Vec::new();
        for command in batch {
            match command {
                Command::Save(draft) => {
                    if let Some(dropped) = latest.insert(draft.instance_id, draft) {
                        debug!(instance_id = %dropped.instance_id, sequence = dropped.sequence, "draft superseded before write");
                    }
                }
                Command::Discard {
                    instance_id,
                    up_to,
                    done,
                } => {
                    if latest
                        .get(&instance_id)
                        .is_some_and(|d| d.sequence <= up_to)
                    {
                        latest.remove(&instance_id);
                    }
                    discards.push((instance_id, up_to, done));
                }
                Command::Flush(done) => flushes.push(done),
            }
        }

        let mut discarded = BTreeSet::new();
        for (instance_id, up_to, done) in discards {
            let result = if discarded.insert(instance_id) {
                delete_stored(&*store, instance_id, up_to).await
            } else {
                Ok(())
            };
            if let Err(e) = &result {
                warn!(%instance_id, error = %e, "draft discard failed");
            }
            let _ = done.send(result);
        }

        for draft in latest.into_values() {
            write_with_retry(&*store, &draft, &config).await;
        }

        for done in flushes {
            let _ = done.send(());
        }
    }
    debug!("autosave worker stopped");
}

/// Delete the stored draft unless it is newer than `up_to`.
async fn delete_stored<S: ObjectStore>(store: &S, instance_id: Uuid, up_to: u64) -> Result<(), StorageError> {
    let key = keys::draft(instance_id);
    match try_load_state::<S, Draft>(store, &key).await? {
        Some((stored, _)) if stored.sequence > up_to => {
            debug!(%instance_id, sequence = stored.sequence, up_to, "newer draft kept on discard");
            Ok(())
        }
        Some(_) => store.delete(&key).await,
        None => Ok(()),
    }
}

async fn write_with_retry<S: ObjectStore>(store: &S, draft: &Draft, config: &AutosaveConfig) {
    let key = keys::draft(draft.instance_id);
    let mut attempt = 0;
    loop {
        match save_state(store, &key, draft).await {
            Ok(_) => {
                debug!(instance_id = %draft.instance_id, sequence = draft.sequence, "draft saved");
                return;
            }
            Err(e) if attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    instance_id = %draft.instance_id,
                    sequence = draft.sequence,
                    attempt,
                    error = %e,
                    "draft save failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(
                    config.retry_backoff_ms * u64::from(attempt),
                ))
                .await;
            }
            Err(e) => {
                error!(
                    instance_id = %draft.instance_id,
                    sequence = draft.sequence,
                    attempts = attempt + 1,
                    error = %e,
                    "draft save failed, giving up"
                );
                return;
            }
        }
    }
}
