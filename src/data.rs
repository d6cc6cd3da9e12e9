use std::{ops::Deref, sync::Arc};

use crate::community::Debounce;
use crate::enforcement::{DiscordEnforcer, Enforcer, Remediation};
use crate::giveaway::{GiveawayManager, GiveawayStore};
use crate::moderation::{ModerationService, detect::MessageTrail};
use crate::settings::{Settings, SettingsError};
use crate::store::{ConfigStore, YamlConfigStore};
use crate::ticket::TicketDesk;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{self as serenity, Http};
use serenity::prelude::TypeMapKey;

/// Messages remembered per user for spam cleanup
const TRAIL_CAPACITY: usize = 100;

/// Grace period for a delete event racing its audit entry
const SNAPSHOT_GRACE: std::time::Duration = std::time::Duration::from_millis(500);

/// Restore data captured from delete events, consumed when the matching audit entry arrives
#[derive(Clone, Default)]
pub struct RestoreSnapshots {
    entries: Arc<DashMap<u64, (Remediation, DateTime<Utc>)>>,
}

impl RestoreSnapshots {
    pub fn insert(&self, target_id: u64, remediation: Remediation, at: DateTime<Utc>) {
        self.entries.insert(target_id, (remediation, at));
    }

    #[must_use]
    pub fn take(&self, target_id: u64) -> Option<Remediation> {
        self.entries.remove(&target_id).map(|(_, (r, _))| r)
    }

    /// Take the snapshot, waiting `grace` once if the delete event has not landed yet
    pub async fn take_settled(&self, target_id: u64, grace: std::time::Duration) -> Option<Remediation> {
        if let Some(remediation) = self.take(target_id) {
            return Some(remediation);
        }
        tokio::time::sleep(grace).await;
        self.take(target_id)
    }

    /// Drop snapshots older than `max_age`
    pub fn prune(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, at)| now - *at < max_age);
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

/// Shared services, cheap to clone through `Data`
pub struct DataInner {
    pub settings: Settings,
    pub moderation: ModerationService,
    pub trail: MessageTrail,
    pub snapshots: RestoreSnapshots,
    pub giveaways: GiveawayManager,
    pub tickets: TicketDesk,
    pub vanity_debounce: Debounce,
    pub booster_debounce: Debounce,
}

// Implement TypeMapKey for Data to allow storing it in Serenity's data map
impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("moderation", &self.moderation)
            .field("trail", &self.trail)
            .field("snapshots", &self.snapshots.len())
            .field("giveaways", &self.giveaways)
            .field("tickets", &self.tickets)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Build every service from settings, loading persisted giveaways
    ///
    /// # Errors
    /// Returns an error if the tracker windows in `settings` are invalid
    pub async fn load(settings: Settings, http: Arc<Http>) -> Result<Self, SettingsError> {
        let store: Arc<dyn ConfigStore> = Arc::new(YamlConfigStore::new(&settings.data_dir));
        let enforcer: Arc<dyn Enforcer> = Arc::new(DiscordEnforcer::new(http));
        let giveaways = GiveawayManager::new(GiveawayStore::load(&settings.data_dir).await);
        Self::with_services(settings, store, enforcer, giveaways)
    }

    /// Assemble from explicit services
    ///
    /// # Errors
    /// Returns an error if the tracker windows in `settings` are invalid
    pub fn with_services(
        settings: Settings,
        store: Arc<dyn ConfigStore>,
        enforcer: Arc<dyn Enforcer>,
        giveaways: GiveawayManager,
    ) -> Result<Self, SettingsError> {
        let moderation = ModerationService::new(settings.tracker_settings()?, store, enforcer);
        Ok(Self(Arc::new(DataInner {
            settings,
            moderation,
            trail: MessageTrail::new(TRAIL_CAPACITY),
            snapshots: RestoreSnapshots::default(),
            giveaways,
            tickets: TicketDesk::default(),
            vanity_debounce: Debounce::default(),
            booster_debounce: Debounce::default(),
        })))
    }

    /// Configuration store shared with the moderation pipeline
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        self.moderation.store()
    }

    /// Restore data for a deleted channel or role, tolerating event reordering
    pub async fn restore_snapshot(&self, target_id: u64) -> Option<Remediation> {
        self.snapshots.take_settled(target_id, SNAPSHOT_GRACE).await
    }

    /// Periodic cleanup of idle tracker windows, trails and stale snapshots
    pub fn prune(&self, now: DateTime<Utc>) {
        self.moderation.prune_idle(now);
        self.trail.prune_idle(now, Duration::minutes(5));
        self.snapshots.prune(now, Duration::minutes(1));
    }
}
