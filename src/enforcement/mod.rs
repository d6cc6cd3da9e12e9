//! Enforcement through the Discord API
//!
//! The moderation pipeline talks to Discord only through the `Enforcer` trait.
//! `DiscordEnforcer` resolves the target, checks role hierarchy, and dispatches
//! to the handler registered for the decided punishment.

mod error;
mod handler;
mod remediation;

pub use error::{EnforcementError, EnforcementResult};
pub use handler::{ActionHandler, ActionHandlerRegistry, PunishTarget, get_guild_and_member, top_position};
pub use remediation::Remediation;

use crate::moderation::EnforcementDecision;
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateMessage, GuildId, Http, UserId};
use std::sync::Arc;
use tracing::info;

/// Capability to punish actors and repair damage in a guild
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enforcer: Send + Sync {
    /// Apply `decision` to `user_id`
    async fn punish(
        &self,
        guild_id: u64,
        user_id: u64,
        decision: &EnforcementDecision,
        reason: &str,
    ) -> EnforcementResult<()>;

    /// Undo a side effect of the violation
    async fn remediate(&self, guild_id: u64, remediation: &Remediation) -> EnforcementResult<()>;

    /// Post an operator-visible report
    async fn report(&self, channel_id: u64, content: &str) -> EnforcementResult<()>;
}

/// Enforcer backed by serenity's HTTP client
pub struct DiscordEnforcer {
    http: Arc<Http>,
    registry: ActionHandlerRegistry,
}

impl DiscordEnforcer {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            registry: ActionHandlerRegistry::new(),
        }
    }
}

impl std::fmt::Debug for DiscordEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordEnforcer")
            .field("handlers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Enforcer for DiscordEnforcer {
    async fn punish(
        &self,
        guild_id: u64,
        user_id: u64,
        decision: &EnforcementDecision,
        reason: &str,
    ) -> EnforcementResult<()> {
        let http = self.http.as_ref();
        let (guild, member) =
            get_guild_and_member(http, GuildId::new(guild_id), UserId::new(user_id)).await?;

        let bot_id = http.get_current_user().await?.id;
        let bot_member = guild.id.member(http, bot_id).await.map_err(|e| {
            EnforcementError::GuildOrMemberNotFound(format!("Failed to get bot member: {e}"))
        })?;
        let bot_top_position = top_position(&guild, &bot_member.roles);

        if guild.owner_id == member.user.id || top_position(&guild, &member.roles) >= bot_top_position
        {
            return Err(EnforcementError::Hierarchy { guild_id, user_id });
        }

        info!(
            "Applying {} to user {user_id} in guild {guild_id}",
            decision.action
        );

        let mut target = PunishTarget {
            guild: &guild,
            member,
            bot_top_position,
            reason,
        };
        self.registry.execute(http, &mut target, decision).await
    }

    async fn remediate(&self, guild_id: u64, remediation: &Remediation) -> EnforcementResult<()> {
        remediation.apply(&self.http, GuildId::new(guild_id)).await
    }

    async fn report(&self, channel_id: u64, content: &str) -> EnforcementResult<()> {
        ChannelId::new(channel_id)
            .send_message(&self.http, CreateMessage::new().content(content))
            .await?;
        Ok(())
    }
}
