use serde::{Serialize, de::DeserializeOwned};

use crate::error::StorageError;
use crate::store::ObjectStore;

/// Load a JSON document. Returns the deserialized value and its ETag.
pub async fn load_state<S: ObjectStore, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<(T, String), StorageError> {
    let output = store.get(key).await?;
    let value: T = serde_json::from_slice(&output.body)?;
    Ok((value, output.etag))
}

/// Like [`load_state`], but a missing document is `Ok(None)`.
pub async fn try_load_state<S: ObjectStore, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<(T, String)>, StorageError> {
    match load_state(store, key).await {
        Ok(loaded) => Ok(Some(loaded)),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Save a JSON document unconditionally. Returns the new ETag.
pub async fn save_state<S: ObjectStore, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<String, StorageError> {
    let body = serde_json::to_vec_pretty(value)?;
    store.put(key, body).await
}

/// Save a JSON document with ETag optimistic locking.
pub async fn save_state_if_match<S: ObjectStore, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
    expected_etag: &str,
) -> Result<String, StorageError> {
    let body = serde_json::to_vec_pretty(value)?;
    store.put_if_match(key, body, expected_etag).await
}

/// Create a JSON document that must not already exist.
pub async fn create_state<S: ObjectStore, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<String, StorageError> {
    let body = serde_json::to_vec_pretty(value)?;
    store.put_if_absent(key, body).await
}
