use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-instance write locks.
///
/// Serializes mutations of one checklist within this process so a status
/// check and the write it guards cannot interleave with another writer.
/// Cross-process writers are still arbitrated by ETag compare-and-swap.
#[derive(Default)]
pub struct InstanceLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, instance_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(instance_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
