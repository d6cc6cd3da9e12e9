//! Per-guild configuration persistence
//!
//! Each guild's `GuildModerationConfig` lives in its own YAML document.
//! Readers get immutable `Arc` snapshots; writers go through `update`, which
//! serializes read-modify-write per guild.

use crate::moderation::{CONFIG_VERSION, GuildModerationConfig};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors from reading or writing configuration documents
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config document {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config document for guild {scope_id} has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        scope_id: u64,
        found: u32,
        supported: u32,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Mutation applied by `ConfigStore::update`
pub type UpdateFn = Box<dyn FnOnce(&mut GuildModerationConfig) + Send>;

/// Source of per-guild configuration snapshots
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current snapshot, `None` when the guild has never been configured
    async fn get(&self, scope_id: u64) -> StoreResult<Option<Arc<GuildModerationConfig>>>;

    /// Replace the whole document
    async fn put(&self, scope_id: u64, config: GuildModerationConfig) -> StoreResult<()>;

    /// Atomically modify the document, starting from the default when absent
    async fn update(&self, scope_id: u64, apply: UpdateFn) -> StoreResult<Arc<GuildModerationConfig>>;

    /// Snapshot or the default configuration
    async fn get_or_default(&self, scope_id: u64) -> StoreResult<Arc<GuildModerationConfig>> {
        Ok(self.get(scope_id).await?.unwrap_or_default())
    }
}

/// Run `apply` through `ConfigStore::update`
///
/// # Errors
/// Propagates the store's read or write failure
pub async fn modify<F>(
    store: &dyn ConfigStore,
    scope_id: u64,
    apply: F,
) -> StoreResult<Arc<GuildModerationConfig>>
where
    F: FnOnce(&mut GuildModerationConfig) + Send + 'static,
{
    store.update(scope_id, Box::new(apply)).await
}

fn check_version(scope_id: u64, config: &GuildModerationConfig) -> StoreResult<()> {
    if config.version > CONFIG_VERSION {
        return Err(StoreError::UnsupportedVersion {
            scope_id,
            found: config.version,
            supported: CONFIG_VERSION,
        });
    }
    Ok(())
}

/// One YAML file per guild under `<data_dir>/guilds/`
pub struct YamlConfigStore {
    dir: PathBuf,
    cache: DashMap<u64, Arc<GuildModerationConfig>>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("guilds"),
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn path_for(&self, scope_id: u64) -> PathBuf {
        self.dir.join(format!("{scope_id}.yaml"))
    }

    fn lock_for(&self, scope_id: u64) -> Arc<Mutex<()>> {
        self.locks.entry(scope_id).or_default().clone()
    }

    async fn load(&self, scope_id: u64) -> StoreResult<Option<GuildModerationConfig>> {
        let path = self.path_for(scope_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let config: GuildModerationConfig =
            serde_yaml::from_str(&content).map_err(|source| StoreError::Yaml {
                path: path.clone(),
                source,
            })?;
        check_version(scope_id, &config)?;
        debug!("Loaded config for guild {scope_id} from {}", path.display());
        Ok(Some(config))
    }

    async fn write(&self, scope_id: u64, config: &GuildModerationConfig) -> StoreResult<()> {
        let path = self.path_for(scope_id);
        let yaml = serde_yaml::to_string(config).map_err(|source| StoreError::Yaml {
            path: path.clone(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Saved config for guild {scope_id}");
        Ok(())
    }
}

impl std::fmt::Debug for YamlConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YamlConfigStore")
            .field("dir", &self.dir)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigStore for YamlConfigStore {
    async fn get(&self, scope_id: u64) -> StoreResult<Option<Arc<GuildModerationConfig>>> {
        if let Some(cached) = self.cache.get(&scope_id) {
            return Ok(Some(Arc::clone(&cached)));
        }

        let Some(config) = self.load(scope_id).await? else {
            return Ok(None);
        };
        let snapshot = Arc::new(config);
        self.cache.insert(scope_id, Arc::clone(&snapshot));
        Ok(Some(snapshot))
    }

    async fn put(&self, scope_id: u64, mut config: GuildModerationConfig) -> StoreResult<()> {
        let lock = self.lock_for(scope_id);
        let _guard = lock.lock().await;

        config.version = CONFIG_VERSION;
        self.write(scope_id, &config).await?;
        self.cache.insert(scope_id, Arc::new(config));
        Ok(())
    }

    async fn update(&self, scope_id: u64, apply: UpdateFn) -> StoreResult<Arc<GuildModerationConfig>> {
        let lock = self.lock_for(scope_id);
        let _guard = lock.lock().await;

        let cached = self.cache.get(&scope_id).map(|c| GuildModerationConfig::clone(&c));
        let mut config = match cached {
            Some(config) => config,
            None => self.load(scope_id).await?.unwrap_or_default(),
        };

        apply(&mut config);
        config.version = CONFIG_VERSION;
        self.write(scope_id, &config).await?;

        let snapshot = Arc::new(config);
        self.cache.insert(scope_id, Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: DashMap<u64, Arc<GuildModerationConfig>>,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, scope_id: u64) -> StoreResult<Option<Arc<GuildModerationConfig>>> {
        if let Some(config) = self.configs.get(&scope_id) {
            check_version(scope_id, &config)?;
            return Ok(Some(Arc::clone(&config)));
        }
        Ok(None)
    }

    async fn put(&self, scope_id: u64, config: GuildModerationConfig) -> StoreResult<()> {
        self.configs.insert(scope_id, Arc::new(config));
        Ok(())
    }

    async fn update(&self, scope_id: u64, apply: UpdateFn) -> StoreResult<Arc<GuildModerationConfig>> {
        let mut entry = self.configs.entry(scope_id).or_default();
        let mut config = GuildModerationConfig::clone(&entry);
        apply(&mut config);
        config.version = CONFIG_VERSION;
        let snapshot = Arc::new(config);
        *entry = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::ViolationCategory;

    fn temp_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("guild-warden-test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let dir = temp_data_dir();
        let store = YamlConfigStore::new(&dir);

        assert!(store.get(1).await.unwrap().is_none());
        let config = store.get_or_default(1).await.unwrap();
        assert_eq!(*config, GuildModerationConfig::default());
        // Reading defaults never writes a document
        assert!(!dir.join("guilds").join("1.yaml").exists());
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        let dir = temp_data_dir();
        let store = YamlConfigStore::new(&dir);

        modify(&store, 42, |c| {
            c.enabled = true;
            c.whitelist.insert(7);
            c.policy_mut(ViolationCategory::MassBan).threshold = 3;
        })
        .await
        .unwrap();

        let reopened = YamlConfigStore::new(&dir);
        let config = reopened.get(42).await.unwrap().unwrap();
        assert!(config.enabled);
        assert!(config.whitelist.contains(&7));
        assert_eq!(config.policy(ViolationCategory::MassBan).threshold, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejects_newer_version() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(dir.join("guilds")).unwrap();
        std::fs::write(dir.join("guilds").join("9.yaml"), "version: 99\nenabled: true\n").unwrap();

        let store = YamlConfigStore::new(&dir);
        let err = store.get(9).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion { scope_id: 9, found: 99, .. }
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_malformed_document_is_error() {
        let dir = temp_data_dir();
        std::fs::create_dir_all(dir.join("guilds")).unwrap();
        std::fs::write(dir.join("guilds").join("3.yaml"), "enabled: [not a bool\n").unwrap();

        let store = YamlConfigStore::new(&dir);
        assert!(matches!(store.get(3).await, Err(StoreError::Yaml { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let dir = temp_data_dir();
        let store = Arc::new(YamlConfigStore::new(&dir));

        let mut tasks = Vec::new();
        for user in 0..20u64 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                modify(&*store, 5, move |c| {
                    c.whitelist.insert(user);
                })
                .await
                .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let reopened = YamlConfigStore::new(&dir);
        assert_eq!(reopened.get(5).await.unwrap().unwrap().whitelist.len(), 20);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryConfigStore::new();
        assert!(store.get(1).await.unwrap().is_none());

        let updated = modify(&store, 1, |c| c.enabled = true).await.unwrap();
        assert!(updated.enabled);

        let before = store.get(1).await.unwrap().unwrap();
        modify(&store, 1, |c| c.enabled = false).await.unwrap();
        // Earlier snapshots are immutable
        assert!(before.enabled);
        assert!(!store.get(1).await.unwrap().unwrap().enabled);
    }
}
