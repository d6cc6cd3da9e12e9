//! Timed giveaways
//!
//! Members enter by reacting with 🎉 on the announcement message. When the
//! giveaway's delayed task fires, winners are drawn and announced in the channel.

mod record;
mod store;

pub use record::{GiveawayRecord, GiveawayState, MAX_WINNERS, pick_winners};
pub use store::GiveawayStore;

use crate::scheduler::DelayedTasks;
use chrono::Utc;
use poise::serenity_prelude::{ChannelId, CreateMessage, Http};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Reaction used to enter a giveaway
pub const ENTRY_EMOJI: &str = "🎉";

/// Errors from giveaway operations
#[derive(Debug, Error)]
pub enum GiveawayError {
    #[error("Giveaway cannot go from {from} to {to}")]
    InvalidTransition {
        from: GiveawayState,
        to: GiveawayState,
    },

    #[error("No giveaway found for message {0}")]
    NotFound(u64),

    #[error("Winner count must be between 1 and 10, got {0}")]
    InvalidWinnerCount(u32),

    #[error("Failed to persist giveaways: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize giveaways: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type GiveawayResult<T> = Result<T, GiveawayError>;

/// Message posted when a giveaway ends or is rerolled
#[must_use]
pub fn announcement(record: &GiveawayRecord, reroll: bool) -> String {
    if record.winners.is_empty() {
        return format!("No one entered the giveaway for **{}**!", record.prize);
    }

    let mentions: Vec<String> = record.winners.iter().map(|id| format!("<@{id}>")).collect();
    if reroll {
        format!("Reroll winner {} for **{}**!", mentions.join(" "), record.prize)
    } else {
        format!("{} won the giveaway for **{}**!", mentions.join(" "), record.prize)
    }
}

/// Giveaway records plus their pending end timers
#[derive(Clone, Debug)]
pub struct GiveawayManager {
    store: GiveawayStore,
    timers: DelayedTasks<u64>,
}

impl GiveawayManager {
    #[must_use]
    pub fn new(store: GiveawayStore) -> Self {
        Self {
            store,
            timers: DelayedTasks::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &GiveawayStore {
        &self.store
    }

    #[must_use]
    pub fn is_scheduled(&self, message_id: u64) -> bool {
        self.timers.is_scheduled(&message_id)
    }

    /// Register a new giveaway and arm its end timer
    ///
    /// # Errors
    /// Returns an error if the store cannot be saved
    pub async fn start(&self, http: Arc<Http>, record: GiveawayRecord) -> GiveawayResult<()> {
        self.store.add(record.clone());
        self.store.save().await?;
        self.arm(http, &record);
        Ok(())
    }

    /// Re-arm timers for giveaways still running after a restart
    pub fn resume(&self, http: &Arc<Http>) -> usize {
        let running = self.store.running();
        for record in &running {
            self.arm(Arc::clone(http), record);
        }
        if !running.is_empty() {
            info!("Resumed {} running giveaways", running.len());
        }
        running.len()
    }

    fn arm(&self, http: Arc<Http>, record: &GiveawayRecord) {
        let (guild_id, message_id) = (record.guild_id, record.message_id);
        let delay = (record.ends_at - Utc::now()).to_std().unwrap_or_default();
        let manager = self.clone();
        self.timers.schedule(message_id, delay, async move {
            if let Err(e) = manager.conclude(&http, guild_id, message_id).await {
                error!("Failed to end giveaway {message_id}: {e}");
            }
        });
    }

    /// Record an entry from a reaction and persist it
    pub async fn enter(&self, message_id: u64, user_id: u64) -> bool {
        let changed = self.store.update(message_id, |r| r.enter(user_id)).unwrap_or(false);
        if changed {
            self.persist_entries(message_id).await;
        }
        changed
    }

    /// Withdraw an entry when the reaction is removed
    pub async fn leave(&self, message_id: u64, user_id: u64) -> bool {
        let changed = self.store.update(message_id, |r| r.leave(user_id)).unwrap_or(false);
        if changed {
            self.persist_entries(message_id).await;
        }
        changed
    }

    async fn persist_entries(&self, message_id: u64) {
        if let Err(e) = self.store.save().await {
            warn!("Failed to save entries for giveaway {message_id}: {e}");
        }
    }

    /// Fail with `NotFound` unless the giveaway belongs to `guild_id`
    fn ensure_in(&self, guild_id: u64, message_id: u64) -> GiveawayResult<()> {
        self.store
            .get_in(guild_id, message_id)
            .map(|_| ())
            .ok_or(GiveawayError::NotFound(message_id))
    }

    /// Draw winners without announcing
    ///
    /// # Errors
    /// Returns an error if the giveaway is unknown in this guild or not running
    pub async fn finish(&self, guild_id: u64, message_id: u64) -> GiveawayResult<GiveawayRecord> {
        self.ensure_in(guild_id, message_id)?;
        let record = self.store.update(message_id, |r| {
            r.end(&mut rand::rng())?;
            Ok::<_, GiveawayError>(r.clone())
        })??;
        self.timers.cancel(&message_id);
        self.store.save().await?;
        Ok(record)
    }

    /// End now (or on timer), draw winners and announce them
    ///
    /// # Errors
    /// Returns an error if the giveaway cannot be ended
    pub async fn conclude(
        &self,
        http: &Http,
        guild_id: u64,
        message_id: u64,
    ) -> GiveawayResult<GiveawayRecord> {
        let record = self.finish(guild_id, message_id).await?;
        self.announce(http, &record, false).await;
        Ok(record)
    }

    /// Cancel a running giveaway and its timer
    ///
    /// # Errors
    /// Returns an error if the giveaway is unknown in this guild or not running
    pub async fn cancel(&self, guild_id: u64, message_id: u64) -> GiveawayResult<()> {
        self.ensure_in(guild_id, message_id)?;
        self.store.update(message_id, GiveawayRecord::cancel)??;
        self.timers.cancel(&message_id);
        self.store.save().await
    }

    /// Draw new winners for an ended giveaway
    ///
    /// # Errors
    /// Returns an error unless the giveaway has ended in this guild
    pub async fn reroll(&self, guild_id: u64, message_id: u64) -> GiveawayResult<GiveawayRecord> {
        self.ensure_in(guild_id, message_id)?;
        let record = self.store.update(message_id, |r| {
            r.reroll(&mut rand::rng())?;
            Ok::<_, GiveawayError>(r.clone())
        })??;
        self.store.save().await?;
        Ok(record)
    }

    /// Post the winners in the giveaway's channel
    pub async fn announce(&self, http: &Http, record: &GiveawayRecord, reroll: bool) {
        let content = announcement(record, reroll);
        if let Err(e) = ChannelId::new(record.channel_id)
            .send_message(http, CreateMessage::new().content(content))
            .await
        {
            error!(
                "Failed to announce giveaway {} in channel {}: {e}",
                record.message_id, record.channel_id
            );
        }
    }
}
