use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::store::{ObjectStore, StoredObject};

struct Entry {
    body: Vec<u8>,
    etag: String,
}

/// In-process store used for tests and single-node embedding.
///
/// ETags are drawn from a store-wide counter so a key that is deleted and
/// recreated never reuses an earlier ETag.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Entry>,
    next_etag: u64,
}

impl Inner {
    fn insert(&mut self, key: &str, body: Vec<u8>) -> String {
        self.next_etag += 1;
        let etag = format!("\"{}\"", self.next_etag);
        self.objects.insert(
            key.to_string(),
            Entry {
                body,
                etag: etag.clone(),
            },
        );
        etag
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .get(key)
            .map(|e| StoredObject {
                body: e.body.clone(),
                etag: e.etag.clone(),
            })
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        Ok(self.inner.lock().await.insert(key, body))
    }

    async fn put_if_match(
        &self,
        key: &str,
        body: Vec<u8>,
        expected_etag: &str,
    ) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.objects.get(key) {
            Some(e) if e.etag == expected_etag => Ok(inner.insert(key, body)),
            // S3 answers If-Match on a missing key with NoSuchKey.
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Some(_) => Err(StorageError::PreconditionFailed {
                key: key.to_string(),
            }),
        }
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.objects.contains_key(key) {
            return Err(StorageError::PreconditionFailed {
                key: key.to_string(),
            });
        }
        Ok(inner.insert(key, body))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().await.objects.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
