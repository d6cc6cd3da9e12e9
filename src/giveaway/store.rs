//! Giveaway store
//!
//! All giveaways live in one map keyed by announcement message id and are
//! persisted together as a single YAML document.

use super::{GiveawayError, GiveawayRecord, GiveawayResult};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Store for giveaway records
#[derive(Clone)]
pub struct GiveawayStore {
    records: Arc<DashMap<u64, GiveawayRecord>>,
    path: Arc<PathBuf>,
    /// Held for a whole save so writers never share the temp file
    save_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for GiveawayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiveawayStore")
            .field("records", &self.records.len())
            .field("path", &self.path)
            .finish()
    }
}

impl GiveawayStore {
    /// Empty store persisting to `<data_dir>/giveaways.yaml`
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            path: Arc::new(data_dir.join("giveaways.yaml")),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load persisted giveaways, starting empty when the file is missing or unreadable
    pub async fn load(data_dir: &Path) -> Self {
        let store = Self::new(data_dir);

        match tokio::fs::read_to_string(store.path.as_ref()).await {
            Ok(content) => match serde_yaml::from_str::<Vec<GiveawayRecord>>(&content) {
                Ok(records) => {
                    info!("Loaded {} giveaways", records.len());
                    for record in records {
                        store.records.insert(record.message_id, record);
                    }
                }
                Err(e) => warn!("Ignoring malformed giveaway file: {e}"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read giveaway file: {e}"),
        }

        store
    }

    /// Write every record through a temp file
    ///
    /// # Errors
    /// Returns an error if serialization or the file write fails
    pub async fn save(&self) -> GiveawayResult<()> {
        let _guard = self.save_lock.lock().await;
        let mut records = self.get_all();
        records.sort_by_key(|r| r.message_id);
        let yaml = serde_yaml::to_string(&records)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, self.path.as_ref()).await?;
        Ok(())
    }

    pub fn add(&self, record: GiveawayRecord) {
        self.records.insert(record.message_id, record);
    }

    #[must_use]
    pub fn get(&self, message_id: u64) -> Option<GiveawayRecord> {
        self.records.get(&message_id).map(|r| r.value().clone())
    }

    /// Record for `message_id` only if it belongs to `guild_id`
    #[must_use]
    pub fn get_in(&self, guild_id: u64, message_id: u64) -> Option<GiveawayRecord> {
        self.get(message_id).filter(|r| r.guild_id == guild_id)
    }

    /// Apply `f` to a record under its entry lock
    ///
    /// # Errors
    /// Returns `NotFound` if there is no giveaway for `message_id`
    pub fn update<T>(
        &self,
        message_id: u64,
        f: impl FnOnce(&mut GiveawayRecord) -> T,
    ) -> GiveawayResult<T> {
        let mut record = self
            .records
            .get_mut(&message_id)
            .ok_or(GiveawayError::NotFound(message_id))?;
        Ok(f(&mut record))
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<GiveawayRecord> {
        self.records.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn running(&self) -> Vec<GiveawayRecord> {
        self.records
            .iter()
            .filter(|e| e.value().is_running())
            .map(|e| e.value().clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("guild-warden-giveaways-{}", uuid::Uuid::new_v4()))
    }

    fn record(message_id: u64) -> GiveawayRecord {
        GiveawayRecord::new(message_id, 1, 2, 3, "Prize", 1, Utc::now()).unwrap()
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = GiveawayStore::new(&temp_data_dir());
        assert!(matches!(
            store.update(5, |r| r.enter(1)),
            Err(GiveawayError::NotFound(5))
        ));
    }

    #[test]
    fn test_running_filters_terminal() {
        let store = GiveawayStore::new(&temp_data_dir());
        store.add(record(1));
        store.add(record(2));
        store.update(2, GiveawayRecord::cancel).unwrap().unwrap();

        let running = store.running();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].message_id, 1);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = temp_data_dir();
        let store = GiveawayStore::new(&dir);
        store.add(record(1));
        store.update(1, |r| r.enter(42)).unwrap();
        store.save().await.unwrap();

        let loaded = GiveawayStore::load(&dir).await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get(1).unwrap().entrants.contains(&42));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_get_in_checks_guild() {
        let store = GiveawayStore::new(&temp_data_dir());
        store.add(record(1));
        assert!(store.get_in(1, 1).is_some());
        assert!(store.get_in(9, 1).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_a_readable_file() {
        let dir = temp_data_dir();
        let store = GiveawayStore::new(&dir);
        for id in 1..=5 {
            store.add(record(id));
        }

        let saves: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save().await })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let loaded = GiveawayStore::load(&dir).await;
        assert_eq!(loaded.len(), 5);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let loaded = GiveawayStore::load(&temp_data_dir()).await;
        assert!(loaded.is_empty());
    }
}
