use super::{can_configure, scope_id, update_config};
use crate::community::{ReactionRole, ReactionRoles, emoji_key};
use crate::{COMMAND_TARGET, Context, Error};
use poise::serenity_prelude::{MessageId, ReactionType, Role};
use std::fmt::Write as _;
use tracing::info;

fn parse_message_id(raw: &str) -> Result<MessageId, String> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|&id| id != 0)
        .map(MessageId::new)
        .ok_or_else(|| format!("`{raw}` is not a message id."))
}

/// Give roles to members who react to a message
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    subcommands("set", "remove", "list"),
    subcommand_required
)]
pub async fn buttonrole(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Bind a role to a reaction on a message in this channel
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Message id"] message_id: String,
    #[description = "Role to give"] role: Role,
    #[description = "Emoji to react with"] emoji: String,
) -> Result<(), Error> {
    let message_id = parse_message_id(&message_id)?;
    if role.managed || role.id.get() == scope_id(ctx)? {
        ctx.say("That role cannot be assigned by the bot.").await?;
        return Ok(());
    }
    let reaction = ReactionType::try_from(emoji.as_str())
        .map_err(|_| format!("`{emoji}` is not an emoji I can react with."))?;
    let channel = ctx.channel_id();
    channel
        .create_reaction(ctx.http(), message_id, reaction.clone())
        .await?;

    let entry = ReactionRole {
        role_id: role.id.get(),
        emoji: emoji_key(&reaction),
        channel_id: channel.get(),
    };
    let message = message_id.get();
    update_config(ctx, move |c| {
        c.reaction_roles.insert(message, entry);
    })
    .await?;
    info!(
        target: COMMAND_TARGET,
        "{} bound role {} to message {message} in guild {:?}",
        ctx.author().id,
        role.id,
        ctx.guild_id()
    );
    ctx.say(format!(
        "Reacting with {reaction} on that message now gives <@&{}>.",
        role.id
    ))
    .await?;
    Ok(())
}

/// Unbind the role from a message
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Message id"] message_id: String,
) -> Result<(), Error> {
    let message_id = parse_message_id(&message_id)?;
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    let message = message_id.get();
    if !config.reaction_roles.contains_key(&message) {
        ctx.say("No reaction role is bound to that message.").await?;
        return Ok(());
    }
    update_config(ctx, move |c| {
        c.reaction_roles.remove(&message);
    })
    .await?;
    ctx.say("Reaction role removed.").await?;
    Ok(())
}

fn list_text(roles: &ReactionRoles) -> String {
    if roles.is_empty() {
        return "No reaction roles are set up.".to_string();
    }
    let mut text = String::from("**Reaction roles**\n");
    for (message, entry) in roles {
        let emoji = if entry.emoji.chars().all(|c| c.is_ascii_digit()) {
            format!("<:emoji:{}>", entry.emoji)
        } else {
            entry.emoji.clone()
        };
        let _ = writeln!(
            text,
            "{emoji} on message {message} in <#{}> gives <@&{}>",
            entry.channel_id, entry.role_id
        );
    }
    text
}

/// List reaction roles
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(list_text(&config.reaction_roles)).await?;
    Ok(())
}
