use std::future::Future;

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::s3::S3Store;

/// An object body together with the ETag it was read at.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: String,
}

/// Key-value persistence with optimistic concurrency.
///
/// Every write returns the object's new ETag. Conditional writes fail with
/// [`StorageError::PreconditionFailed`] when another writer got there first.
pub trait ObjectStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<StoredObject, StorageError>> + Send;

    fn put(&self, key: &str, body: Vec<u8>)
    -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Replace the object only if its current ETag is `expected_etag`.
    fn put_if_match(
        &self,
        key: &str,
        body: Vec<u8>,
        expected_etag: &str,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Create the object only if nothing exists at `key`.
    fn put_if_absent(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Delete the object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Keys under `prefix`, sorted.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

/// A store selected at runtime from configuration.
pub enum AnyStore {
    Memory(MemoryStore),
    S3(S3Store),
}

impl ObjectStore for AnyStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        match self {
            Self::Memory(s) => s.get(key).await,
            Self::S3(s) => s.get(key).await,
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        match self {
            Self::Memory(s) => s.put(key, body).await,
            Self::S3(s) => s.put(key, body).await,
        }
    }

    async fn put_if_match(
        &self,
        key: &str,
        body: Vec<u8>,
        expected_etag: &str,
    ) -> Result<String, StorageError> {
        match self {
            Self::Memory(s) => s.put_if_match(key, body, expected_etag).await,
            Self::S3(s) => s.put_if_match(key, body, expected_etag).await,
        }
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        match self {
            Self::Memory(s) => s.put_if_absent(key, body).await,
            Self::S3(s) => s.put_if_absent(key, body).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(s) => s.delete(key).await,
            Self::S3(s) => s.delete(key).await,
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Self::Memory(s) => s.list(prefix).await,
            Self::S3(s) => s.list(prefix).await,
        }
    }
}
