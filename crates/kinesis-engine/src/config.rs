use std::path::{Path, PathBuf};

use kinesis_storage::client::build_client;
use kinesis_storage::error::StorageError;
use kinesis_storage::memory::MemoryStore;
use kinesis_storage::s3::S3Store;
use kinesis_storage::store::AnyStore;
use serde::{Deserialize, Serialize};

/// Shape version written by [`save_config`].
/// Older files are upgraded by [`migrate`] on load.
const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 0 or absent means a flat pre-1 file.
    #[serde(default)]
    pub config_version: u32,
    /// Minimum progress for `in_progress → completed` without the
    /// acknowledged-incomplete override.
    #[serde(default = "default_threshold")]
    pub completion_threshold: u8,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub notes: NoteConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        prefix: String,
    },
}

impl StorageConfig {
    /// Whether state written through this store outlives the process.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Memory)
    }

    /// Fail unless the store is durable. Short-lived tools use this so that
    /// writes are never silently thrown away on exit.
    pub fn require_durable(&self) -> eyre::Result<()> {
        if self.is_durable() {
            return Ok(());
        }
        Err(eyre::eyre!(
            "storage is in-memory and would be discarded on exit; configure s3 storage or set KINESIS_BUCKET"
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteConfig {
    pub primary_locale: String,
    pub secondary_locale: String,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            primary_locale: "en".to_string(),
            secondary_locale: "ar".to_string(),
        }
    }
}

fn default_threshold() -> u8 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            completion_threshold: default_threshold(),
            storage: StorageConfig::default(),
            autosave: AutosaveConfig::default(),
            notes: NoteConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Apply `KINESIS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> eyre::Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup. `KINESIS_BUCKET` switches
    /// storage to S3; `KINESIS_REGION` only applies to S3 storage.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<()> {
        if let Some(bucket) = lookup("KINESIS_BUCKET") {
            self.storage = match std::mem::take(&mut self.storage) {
                StorageConfig::S3 { region, prefix, .. } => StorageConfig::S3 {
                    bucket,
                    region,
                    prefix,
                },
                StorageConfig::Memory => StorageConfig::S3 {
                    bucket,
                    region: None,
                    prefix: String::new(),
                },
            };
        }
        if let Some(value) = lookup("KINESIS_REGION")
            && let StorageConfig::S3 { region, .. } = &mut self.storage
        {
            *region = Some(value);
        }
        if let Some(value) = lookup("KINESIS_COMPLETION_THRESHOLD") {
            self.completion_threshold = value
                .trim()
                .parse()
                .map_err(|e| eyre::eyre!("invalid KINESIS_COMPLETION_THRESHOLD '{value}': {e}"))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.completion_threshold > 100 {
            return Err(eyre::eyre!(
                "completion_threshold must be between 0 and 100, got {}",
                self.completion_threshold
            ));
        }
        if let StorageConfig::S3 { bucket, .. } = &self.storage
            && bucket.trim().is_empty()
        {
            return Err(eyre::eyre!("s3 storage requires a bucket"));
        }
        Ok(())
    }
}

/// `<platform config dir>/kinesis/config.json`.
pub fn default_config_path() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join("kinesis").join("config.json"))
}

pub fn load_config(path: &Path) -> eyre::Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so migrations run before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: EngineConfig = serde_json::from_value(migrated)?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise defaults. Environment overrides are
/// applied either way.
pub fn load_or_default(path: &Path) -> eyre::Result<EngineConfig> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        EngineConfig::default()
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Upgrade raw JSON one version at a time until it reaches [`CURRENT_VERSION`].
fn migrate(mut json: serde_json::Value, from_version: u32) -> eyre::Result<serde_json::Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        ));
    }

    // v0 → v1: flat `bucket`/`region` keys move under a tagged `storage`.
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;
        let bucket = obj.remove("bucket");
        let region = obj.remove("region");
        if let Some(bucket) = bucket {
            obj.insert(
                "storage".to_string(),
                serde_json::json!({
                    "type": "s3",
                    "bucket": bucket,
                    "region": region,
                }),
            );
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (storage section)");
    }

    Ok(json)
}

pub fn save_config(config: &EngineConfig, path: &Path) -> eyre::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path {} has no parent", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    // Readers never observe a half-written file.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// Construct the configured object store.
pub async fn build_store(storage: &StorageConfig) -> Result<AnyStore, StorageError> {
    let store = match storage {
        StorageConfig::Memory => AnyStore::Memory(MemoryStore::new()),
        StorageConfig::S3 {
            bucket,
            region,
            prefix,
        } => {
            let client = build_client(region.as_deref()).await?;
            AnyStore::S3(S3Store::new(client, bucket.clone(), prefix.clone()))
        }
    };
    Ok(store)
}
