//! Gateway event handlers
//!
//! Events are classified here and handed to the moderation pipeline; ticket
//! buttons go to the ticket desk and member events to the community features. Nothing in this module fails outward: every
//! error is logged and the event dropped.

pub mod audit;
pub mod community;
pub mod message;

use crate::giveaway::ENTRY_EMOJI;
use crate::moderation::{ActorProfile, ScopeFacts, ViolationCategory, ViolationEvent};
use crate::{BOT_NAME, Data, EVENT_TARGET, enforcement::Remediation, ticket};
use chrono::Utc;
use message::{MessageFacts, assess};
use poise::serenity_prelude::{
    self as serenity, AuditLogEntry, ChannelId, Context, EventHandler, GuildChannel, GuildId,
    GuildMemberUpdateEvent, Interaction, Member, Message, MessageId, Presence, Reaction,
    ReactionType, Ready, Role, RoleId, UserId,
};
use tracing::{debug, info, warn};

pub struct Handler;

/// Shared state, absent until the framework setup has run
async fn data(ctx: &Context) -> Option<Data> {
    ctx.data.read().await.get::<Data>().cloned()
}

/// Guild facts from the cache plus the configured bot owners
fn scope_facts(ctx: &Context, data: &Data, guild_id: GuildId) -> ScopeFacts {
    ScopeFacts {
        scope_id: guild_id.get(),
        owner_id: ctx.cache.guild(guild_id).map(|g| g.owner_id.get()),
        bot_user_id: ctx.cache.current_user().id.get(),
        bot_owner_ids: data.settings.owner_ids.clone(),
    }
}

/// Whether any of `roles` (or @everyone) grants administrator or manage messages
fn is_staff(ctx: &Context, guild_id: GuildId, roles: &[RoleId]) -> bool {
    let everyone = RoleId::new(guild_id.get());
    ctx.cache.guild(guild_id).is_some_and(|guild| {
        roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|id| guild.roles.get(id))
            .any(|role| role.permissions.administrator() || role.permissions.manage_messages())
    })
}

/// Actor profile for a member, using cached roles when available
fn cached_actor(ctx: &Context, guild_id: GuildId, user_id: UserId) -> ActorProfile {
    let roles: Vec<RoleId> = ctx
        .cache
        .member(guild_id, user_id)
        .map(|m| m.roles.clone())
        .unwrap_or_default();
    ActorProfile::new(user_id.get())
        .with_staff(is_staff(ctx, guild_id, &roles))
        .with_roles(roles.iter().map(|r| r.get()))
}

async fn delete_message(ctx: &Context, channel_id: ChannelId, message_id: MessageId) {
    if let Err(e) = channel_id.delete_message(&ctx.http, message_id).await {
        warn!(target: EVENT_TARGET, "Failed to delete message {message_id} in {channel_id}: {e}");
    }
}

fn is_entry_emoji(emoji: &ReactionType) -> bool {
    matches!(emoji, ReactionType::Unicode(emoji) if emoji == ENTRY_EMOJI)
}

impl Handler {
    async fn on_message(ctx: &Context, data: &Data, msg: &Message, guild_id: GuildId) {
        let now = Utc::now();
        let scope_id = guild_id.get();
        let user_id = msg.author.id.get();
        data.trail
            .push(scope_id, user_id, msg.channel_id.get(), msg.id.get(), now);

        let config = match data.store().get_or_default(scope_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(target: EVENT_TARGET, "Skipping message checks in guild {guild_id}: {e}");
                return;
            }
        };

        let roles: Vec<RoleId> = msg
            .member
            .as_ref()
            .map(|m| m.roles.clone())
            .unwrap_or_default();
        let actor = ActorProfile::new(user_id)
            .with_staff(is_staff(ctx, guild_id, &roles))
            .with_roles(roles.iter().map(|r| r.get()));
        let facts = scope_facts(ctx, data, guild_id);

        let assessment = assess(
            &config.automod,
            &MessageFacts {
                content: &msg.content,
                user_mentions: msg.mentions.len(),
                role_mentions: msg.mention_roles.len(),
                mentions_everyone: msg.mention_everyone,
            },
        );

        let mut deleted = false;
        if let Some(hit) = &assessment.filter {
            if config
                .exemption(&actor, &facts, ViolationCategory::RepeatedToken)
                .is_none()
            {
                info!(
                    target: EVENT_TARGET,
                    "Removing message {} from {user_id} in guild {guild_id}: {}",
                    msg.id,
                    hit.reason()
                );
                delete_message(ctx, msg.channel_id, msg.id).await;
                deleted = true;

                if matches!(hit, message::FilterHit::RepeatedToken(_)) {
                    let event =
                        ViolationEvent::new(scope_id, ViolationCategory::RepeatedToken, user_id, now);
                    data.moderation.process(&event, &actor, &facts, None).await;
                }
            }
        }

        let spam_window = data
            .moderation
            .settings()
            .spec_for(ViolationCategory::SpamMessage)
            .window();
        let recent = data.trail.recent(
            scope_id,
            user_id,
            msg.channel_id.get(),
            now,
            spam_window,
            config.automod.spam_delete_max as usize,
        );
        let cleanup = (!recent.is_empty()).then(|| Remediation::DeleteMessages {
            channel: msg.channel_id.get(),
            messages: recent,
        });
        let event = ViolationEvent::new(scope_id, ViolationCategory::SpamMessage, user_id, now);
        if data
            .moderation
            .process(&event, &actor, &facts, cleanup)
            .await
            .fired()
        {
            data.trail.clear(scope_id, user_id);
            deleted = true;
        }

        if assessment.has_link
            && config.is_active(ViolationCategory::LinkPost)
            && config
                .exemption(&actor, &facts, ViolationCategory::LinkPost)
                .is_none()
        {
            if !deleted {
                delete_message(ctx, msg.channel_id, msg.id).await;
                deleted = true;
            }
            let event = ViolationEvent::new(scope_id, ViolationCategory::LinkPost, user_id, now);
            data.moderation.process(&event, &actor, &facts, None).await;
        }

        if assessment.mentions > 0 {
            let remediation = (!deleted).then(|| Remediation::DeleteMessages {
                channel: msg.channel_id.get(),
                messages: vec![msg.id.get()],
            });
            let event = ViolationEvent::new(scope_id, ViolationCategory::MassMention, user_id, now)
                .with_occurrences(assessment.mentions);
            data.moderation
                .process(&event, &actor, &facts, remediation)
                .await;
        }
    }

    async fn on_audit_entry(ctx: &Context, data: &Data, entry: &AuditLogEntry, guild_id: GuildId) {
        let changes = entry.changes.as_deref().unwrap_or_default();
        let Some(category) = audit::category_for(&entry.action, changes) else {
            return;
        };
        let target_id = entry.target_id.map(|id| id.get());
        debug!(
            target: EVENT_TARGET,
            "Audit entry {category} by {} on {target_id:?} in guild {guild_id}",
            entry.user_id
        );

        let snapshot = match (category, target_id) {
            (ViolationCategory::ChannelDelete | ViolationCategory::RoleDelete, Some(id)) => {
                let snapshot = data.restore_snapshot(id).await;
                if snapshot.is_none() {
                    debug!(
                        target: EVENT_TARGET,
                        "No restore snapshot for {category} target {id} in guild {guild_id}"
                    );
                }
                snapshot
            }
            _ => None,
        };
        let remediation = audit::remediation_for(category, target_id, changes, snapshot);

        let actor = cached_actor(ctx, guild_id, entry.user_id);
        let facts = scope_facts(ctx, data, guild_id);
        let event = ViolationEvent::new(guild_id.get(), category, entry.user_id.get(), Utc::now());
        data.moderation
            .process(&event, &actor, &facts, remediation)
            .await;
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("{BOT_NAME} connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! Guarding {guild_count} guild(s)");
    }

    async fn message(&self, ctx: Context, new_message: Message) {
        if new_message.author.bot {
            return;
        }
        let Some(guild_id) = new_message.guild_id else {
            return;
        };
        let Some(data) = data(&ctx).await else {
            return;
        };
        Self::on_message(&ctx, &data, &new_message, guild_id).await;
    }

    async fn guild_audit_log_entry_create(
        &self,
        ctx: Context,
        entry: AuditLogEntry,
        guild_id: GuildId,
    ) {
        let Some(data) = data(&ctx).await else {
            return;
        };
        Self::on_audit_entry(&ctx, &data, &entry, guild_id).await;
    }

    async fn channel_delete(
        &self,
        ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        let Some(data) = data(&ctx).await else {
            return;
        };
        data.snapshots.insert(
            channel.id.get(),
            audit::channel_snapshot(&channel),
            Utc::now(),
        );
    }

    async fn guild_role_delete(
        &self,
        ctx: Context,
        guild_id: GuildId,
        removed_role_id: RoleId,
        removed_role_data_if_available: Option<Role>,
    ) {
        let Some(role) = removed_role_data_if_available else {
            debug!(
                target: EVENT_TARGET,
                "Role {removed_role_id} deleted in guild {guild_id} but was not cached"
            );
            return;
        };
        let Some(data) = data(&ctx).await else {
            return;
        };
        data.snapshots
            .insert(removed_role_id.get(), audit::role_snapshot(&role), Utc::now());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let Some(data) = data(&ctx).await else {
            return;
        };
        if let Err(e) = ticket::handle_interaction(&ctx, &data, &component).await {
            warn!(
                target: EVENT_TARGET,
                "Ticket button {} failed in {}: {e}", component.data.custom_id, component.channel_id
            );
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        if new_member.user.bot {
            return;
        }
        let Some(data) = data(&ctx).await else {
            return;
        };
        community::greet(&ctx, &data, &new_member).await;
    }

    async fn guild_member_update(
        &self,
        ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(data) = data(&ctx).await else {
            return;
        };
        community::boost(&ctx, &data, old_if_available.as_ref(), &event).await;
    }

    async fn presence_update(&self, ctx: Context, new_data: Presence) {
        let Some(data) = data(&ctx).await else {
            return;
        };
        community::vanity(&ctx, &data, &new_data).await;
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        let Some(user_id) = add_reaction.user_id else {
            return;
        };
        if add_reaction.member.as_ref().is_some_and(|m| m.user.bot)
            || user_id == ctx.cache.current_user().id
        {
            return;
        }
        let Some(data) = data(&ctx).await else {
            return;
        };
        if !is_entry_emoji(&add_reaction.emoji) {
            community::reaction_role(&ctx, &data, &add_reaction, true).await;
            return;
        }
        if data
            .giveaways
            .enter(add_reaction.message_id.get(), user_id.get())
            .await
        {
            debug!(
                target: EVENT_TARGET,
                "User {user_id} entered giveaway {}", add_reaction.message_id
            );
        }
    }

    async fn reaction_remove(&self, ctx: Context, removed_reaction: Reaction) {
        let Some(user_id) = removed_reaction.user_id else {
            return;
        };
        let Some(data) = data(&ctx).await else {
            return;
        };
        if !is_entry_emoji(&removed_reaction.emoji) {
            community::reaction_role(&ctx, &data, &removed_reaction, false).await;
            return;
        }
        data.giveaways
            .leave(removed_reaction.message_id.get(), user_id.get())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }

    #[test]
    fn test_only_party_popper_enters_giveaways() {
        assert!(is_entry_emoji(&ReactionType::Unicode("🎉".to_string())));
        assert!(!is_entry_emoji(&ReactionType::Unicode("👍".to_string())));
    }
}
