//! Punishment handlers
//!
//! One handler per `PunishmentAction`, looked up through `ActionHandlerRegistry`.

use super::{EnforcementError, EnforcementResult};
use crate::moderation::{EnforcementDecision, PunishmentAction};
use chrono::Utc;
use poise::serenity_prelude::{GuildId, Http, Member, PartialGuild, RoleId, UserId};
use std::collections::HashMap;
use tracing::info;

/// Resolved target of a punishment
pub struct PunishTarget<'a> {
    pub guild: &'a PartialGuild,
    pub member: Member,
    /// Position of the bot's highest role
    pub bot_top_position: u16,
    pub reason: &'a str,
}

/// Trait for applying one kind of punishment
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        decision: &EnforcementDecision,
    ) -> EnforcementResult<()>;
}

/// Registry of punishment handlers
pub struct ActionHandlerRegistry {
    handlers: HashMap<PunishmentAction, Box<dyn ActionHandler>>,
}

impl Default for ActionHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionHandlerRegistry {
    /// Create a new registry with all handlers registered
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };

        registry.register(PunishmentAction::Kick, Box::new(KickHandler));
        registry.register(PunishmentAction::Ban, Box::new(BanHandler));
        registry.register(PunishmentAction::Timeout, Box::new(TimeoutHandler));
        registry.register(PunishmentAction::StripRoles, Box::new(StripRolesHandler));

        registry
    }

    pub fn register(&mut self, action: PunishmentAction, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(action, handler);
    }

    #[must_use]
    pub fn get(&self, action: PunishmentAction) -> Option<&dyn ActionHandler> {
        self.handlers.get(&action).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Execute the handler registered for `decision.action`
    ///
    /// # Errors
    ///
    /// Returns an `EnforcementError` if no handler is registered or the handler fails.
    pub async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        decision: &EnforcementDecision,
    ) -> EnforcementResult<()> {
        match self.get(decision.action) {
            Some(handler) => handler.execute(http, target, decision).await,
            None => Err(EnforcementError::ValidationFailed(format!(
                "No handler registered for action: {}",
                decision.action
            ))),
        }
    }
}

/// Fetch the guild and one of its members
pub async fn get_guild_and_member(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
) -> EnforcementResult<(PartialGuild, Member)> {
    let guild = guild_id.to_partial_guild(http).await.map_err(|e| {
        EnforcementError::GuildOrMemberNotFound(format!("Failed to get guild {guild_id}: {e}"))
    })?;

    let member = guild_id.member(http, user_id).await.map_err(|e| {
        EnforcementError::GuildOrMemberNotFound(format!(
            "Failed to get member {user_id} in guild {guild_id}: {e}"
        ))
    })?;

    Ok((guild, member))
}

/// Highest role position among `roles`, zero for none
#[must_use]
pub fn top_position(guild: &PartialGuild, roles: &[RoleId]) -> u16 {
    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

struct KickHandler;

#[async_trait::async_trait]
impl ActionHandler for KickHandler {
    async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        _decision: &EnforcementDecision,
    ) -> EnforcementResult<()> {
        let user_id = target.member.user.id;
        info!("Kicking user {user_id} from guild {}", target.guild.id);

        target
            .member
            .kick_with_reason(http, target.reason)
            .await
            .map_err(EnforcementError::from)
    }
}

struct BanHandler;

#[async_trait::async_trait]
impl ActionHandler for BanHandler {
    async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        _decision: &EnforcementDecision,
    ) -> EnforcementResult<()> {
        let user_id = target.member.user.id;
        info!("Banning user {user_id} in guild {}", target.guild.id);

        target
            .guild
            .id
            .ban_with_reason(http, user_id, 0, target.reason)
            .await
            .map_err(EnforcementError::from)
    }
}

struct TimeoutHandler;

#[async_trait::async_trait]
impl ActionHandler for TimeoutHandler {
    async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        decision: &EnforcementDecision,
    ) -> EnforcementResult<()> {
        let seconds = i64::try_from(decision.effective_timeout()).map_err(|_| {
            EnforcementError::ValidationFailed("Timeout duration out of range".to_string())
        })?;
        let until = Utc::now() + chrono::Duration::seconds(seconds);
        info!(
            "Timing out user {} in guild {} until {until}",
            target.member.user.id, target.guild.id
        );

        target
            .member
            .disable_communication_until_datetime(http, until.into())
            .await
            .map_err(EnforcementError::from)
    }
}

struct StripRolesHandler;

#[async_trait::async_trait]
impl ActionHandler for StripRolesHandler {
    async fn execute(
        &self,
        http: &Http,
        target: &mut PunishTarget<'_>,
        _decision: &EnforcementDecision,
    ) -> EnforcementResult<()> {
        let removable: Vec<RoleId> = target
            .member
            .roles
            .iter()
            .copied()
            .filter(|id| {
                target
                    .guild
                    .roles
                    .get(id)
                    .is_some_and(|role| !role.managed && role.position < target.bot_top_position)
            })
            .collect();

        info!(
            "Stripping {} roles from user {} in guild {}",
            removable.len(),
            target.member.user.id,
            target.guild.id
        );

        if removable.is_empty() {
            return Ok(());
        }

        target
            .member
            .remove_roles(http, &removable)
            .await
            .map_err(EnforcementError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_action() {
        let registry = ActionHandlerRegistry::new();
        assert_eq!(registry.len(), 4);
        for action in [
            PunishmentAction::Kick,
            PunishmentAction::Ban,
            PunishmentAction::Timeout,
            PunishmentAction::StripRoles,
        ] {
            assert!(registry.get(action).is_some(), "missing handler for {action}");
        }
    }
}
