use kinesis_storage::error::StorageError;
use kinesis_storage::state::{load_state, save_state_if_match};
use kinesis_storage::store::ObjectStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::EngineError;

/// Read-modify-write of one JSON document under ETag compare-and-swap.
///
/// On a lost race the document is re-read and `apply` runs again against the
/// fresh copy. A second lost race surfaces as
/// [`EngineError::ConflictingWrite`]. Errors returned by `apply` abort
/// without writing.
pub(crate) async fn modify<S, T, R, F>(
    store: &S,
    key: &str,
    not_found: (&'static str, String),
    mut apply: F,
) -> Result<(T, R), EngineError>
where
    S: ObjectStore,
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> Result<R, EngineError>,
{
    let mut retried = false;
    loop {
        let (mut doc, etag) = load_state::<S, T>(store, key)
            .await
            .map_err(EngineError::from_storage(not_found.0, &not_found.1))?;
        let out = apply(&mut doc)?;

        match save_state_if_match(store, key, &doc, &etag).await {
            Ok(_) => return Ok((doc, out)),
            Err(StorageError::PreconditionFailed { .. }) if !retried => {
                debug!(key, "conflicting write, re-reading and reapplying");
                retried = true;
            }
            Err(StorageError::PreconditionFailed { .. }) => {
                return Err(EngineError::ConflictingWrite {
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}
