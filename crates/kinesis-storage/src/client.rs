use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;

use crate::error::StorageError;

/// Build an S3 client from the default credential chain, optionally pinned
/// to a region. Fails when no region is given and none can be resolved from
/// the environment or profile.
pub async fn build_client(region: Option<&str>) -> Result<Client, StorageError> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    let config = loader.load().await;
    let Some(resolved) = config.region() else {
        return Err(StorageError::Config(
            "no AWS region configured; set storage.region or AWS_REGION".to_string(),
        ));
    };
    tracing::info!(region = %resolved, "S3 client configured");
    Ok(Client::new(&config))
}
