//! Greetings, vanity roles, boost announcements and reaction roles

use crate::community::{
    BOOSTER_DEBOUNCE, Greeted, VANITY_DEBOUNCE, VanityChange, custom_status, role_for,
};
use crate::{Data, EVENT_TARGET};
use poise::serenity_prelude::{
    ChannelId, Context, CreateMessage, GuildId, GuildMemberUpdateEvent, Member, Presence,
    Reaction, RoleId, Timestamp, UserId,
};
use tracing::{debug, info, warn};

async fn say(ctx: &Context, channel: u64, text: String) {
    let channel = ChannelId::new(channel);
    if let Err(e) = channel.say(&ctx.http, text).await {
        warn!(target: EVENT_TARGET, "Failed to post in {channel}: {e}");
    }
}

pub async fn greet(ctx: &Context, data: &Data, member: &Member) {
    let guild_id = member.guild_id;
    let config = match data.store().get_or_default(guild_id.get()).await {
        Ok(config) => config,
        Err(e) => {
            warn!(target: EVENT_TARGET, "Skipping greeting in guild {guild_id}: {e}");
            return;
        }
    };
    let (guild_name, member_count) = ctx
        .cache
        .guild(guild_id)
        .map(|g| (g.name.clone(), g.member_count))
        .unwrap_or_default();
    let greeted = Greeted {
        user_id: member.user.id.get(),
        user_name: &member.user.name,
        guild_name: &guild_name,
        member_count,
    };
    let Some((channel, text)) = config.welcome.greeting(&greeted) else {
        return;
    };
    let builder = CreateMessage::new()
        .content(text)
        .components(config.welcome.components());
    if let Err(e) = ChannelId::new(channel).send_message(&ctx.http, builder).await {
        warn!(target: EVENT_TARGET, "Failed to greet {} in guild {guild_id}: {e}", member.user.id);
    }
}

async fn has_role(ctx: &Context, guild_id: GuildId, user_id: UserId, role: RoleId) -> Option<bool> {
    let cached = ctx
        .cache
        .member(guild_id, user_id)
        .map(|m| m.roles.contains(&role));
    if cached.is_some() {
        return cached;
    }
    match guild_id.member(&ctx.http, user_id).await {
        Ok(member) => Some(member.roles.contains(&role)),
        Err(e) => {
            debug!(target: EVENT_TARGET, "Member {user_id} not found in guild {guild_id}: {e}");
            None
        }
    }
}

/// Grant or revoke the vanity role after a status change
pub async fn vanity(ctx: &Context, data: &Data, presence: &Presence) {
    let Some(guild_id) = presence.guild_id else {
        return;
    };
    let user_id = presence.user.id;
    if presence.user.bot == Some(true) {
        return;
    }
    let Ok(config) = data.store().get_or_default(guild_id.get()).await else {
        return;
    };
    let Some(role_id) = config.vanity.role_id.filter(|_| config.vanity.enabled) else {
        return;
    };
    let Some(holds) = has_role(ctx, guild_id, user_id, RoleId::new(role_id)).await else {
        return;
    };

    let status = custom_status(&presence.activities);
    match config.vanity.change(&status, holds) {
        VanityChange::Grant { role_id } => {
            if let Err(e) = ctx
                .http
                .add_member_role(guild_id, user_id, RoleId::new(role_id), Some("Vanity status"))
                .await
            {
                warn!(target: EVENT_TARGET, "Failed to grant vanity role to {user_id} in guild {guild_id}: {e}");
                return;
            }
            info!(target: EVENT_TARGET, "Granted vanity role to {user_id} in guild {guild_id}");
            if data
                .vanity_debounce
                .ready((guild_id.get(), user_id.get()), VANITY_DEBOUNCE)
            {
                if let Some((channel, text)) = config.vanity.announcement_for(user_id.get()) {
                    say(ctx, channel, text).await;
                }
            }
        }
        VanityChange::Revoke { role_id } => {
            if let Err(e) = ctx
                .http
                .remove_member_role(guild_id, user_id, RoleId::new(role_id), Some("Vanity status removed"))
                .await
            {
                warn!(target: EVENT_TARGET, "Failed to revoke vanity role from {user_id} in guild {guild_id}: {e}");
                return;
            }
            info!(target: EVENT_TARGET, "Revoked vanity role from {user_id} in guild {guild_id}");
        }
        VanityChange::Keep => {}
    }
}

/// Whether a member update is the moment they started boosting; an unknown
/// previous state never counts
#[must_use]
pub fn started_boosting(before: Option<Option<Timestamp>>, after: Option<Timestamp>) -> bool {
    matches!(before, Some(None)) && after.is_some()
}

pub async fn boost(ctx: &Context, data: &Data, old: Option<&Member>, event: &GuildMemberUpdateEvent) {
    if !started_boosting(old.map(|m| m.premium_since), event.premium_since) {
        return;
    }
    let (guild_id, user_id) = (event.guild_id, event.user.id);
    let Ok(config) = data.store().get_or_default(guild_id.get()).await else {
        return;
    };
    let Some((channel, text)) = config.booster.announcement_for(user_id.get()) else {
        return;
    };
    if data
        .booster_debounce
        .ready((guild_id.get(), user_id.get()), BOOSTER_DEBOUNCE)
    {
        info!(target: EVENT_TARGET, "Announcing boost by {user_id} in guild {guild_id}");
        say(ctx, channel, text).await;
    }
}

/// Add or remove the role bound to this reaction
pub async fn reaction_role(ctx: &Context, data: &Data, reaction: &Reaction, added: bool) {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return;
    };
    if user_id == ctx.cache.current_user().id {
        return;
    }
    let Ok(config) = data.store().get_or_default(guild_id.get()).await else {
        return;
    };
    let Some(role_id) = role_for(
        &config.reaction_roles,
        reaction.message_id.get(),
        &reaction.emoji,
    ) else {
        return;
    };
    let role = RoleId::new(role_id);
    let result = if added {
        ctx.http
            .add_member_role(guild_id, user_id, role, Some("Reaction role"))
            .await
    } else {
        ctx.http
            .remove_member_role(guild_id, user_id, role, Some("Reaction role removed"))
            .await
    };
    match result {
        Ok(()) => debug!(
            target: EVENT_TARGET,
            "Reaction role {role} {} {user_id} in guild {guild_id}",
            if added { "given to" } else { "taken from" }
        ),
        Err(e) => warn!(
            target: EVENT_TARGET,
            "Failed to update reaction role {role} for {user_id} in guild {guild_id}: {e}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_boosting() {
        let now = Timestamp::now();
        assert!(started_boosting(Some(None), Some(now)));
        assert!(!started_boosting(Some(Some(now)), Some(now)));
        assert!(!started_boosting(None, Some(now)));
        assert!(!started_boosting(Some(None), None));
    }
}
