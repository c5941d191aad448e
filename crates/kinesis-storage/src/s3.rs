use aws_sdk_s3::Client;

use crate::error::StorageError;
use crate::objects;
use crate::store::{ObjectStore, StoredObject};

/// [`ObjectStore`] over an S3 bucket. All keys are placed under `prefix`.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn strip(&self, err: StorageError) -> StorageError {
        match err {
            StorageError::NotFound { key } => StorageError::NotFound {
                key: self.relative(&key),
            },
            StorageError::PreconditionFailed { key } => StorageError::PreconditionFailed {
                key: self.relative(&key),
            },
            other => other,
        }
    }

    fn relative(&self, key: &str) -> String {
        key.strip_prefix(&self.prefix).unwrap_or(key).to_string()
    }
}

impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        objects::get_object(&self.client, &self.bucket, &self.full_key(key))
            .await
            .map_err(|e| self.strip(e))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        objects::put_object(&self.client, &self.bucket, &self.full_key(key), body).await
    }

    async fn put_if_match(
        &self,
        key: &str,
        body: Vec<u8>,
        expected_etag: &str,
    ) -> Result<String, StorageError> {
        objects::put_object_if_match(
            &self.client,
            &self.bucket,
            &self.full_key(key),
            body,
            expected_etag,
        )
        .await
        .map_err(|e| self.strip(e))
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<String, StorageError> {
        objects::put_object_if_absent(&self.client, &self.bucket, &self.full_key(key), body)
            .await
            .map_err(|e| self.strip(e))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        objects::delete_object(&self.client, &self.bucket, &self.full_key(key)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = objects::list_objects(&self.client, &self.bucket, &self.full_key(prefix))
            .await?
            .into_iter()
            .map(|k| self.relative(&k))
            .collect::<Vec<_>>();
        keys.sort();
        Ok(keys)
    }
}
