use super::{can_configure, on_off, scope_id, update_config};
use crate::community::{BoosterSettings, VanitySettings};
use crate::{COMMAND_TARGET, Context, Error};
use poise::serenity_prelude::{GuildChannel, Role};
use std::fmt::Write as _;
use tracing::info;

fn mention_role(id: Option<u64>) -> String {
    id.map_or_else(|| "Not set".to_string(), |id| format!("<@&{id}>"))
}

fn mention_channel(id: Option<u64>) -> String {
    id.map_or_else(|| "Not set".to_string(), |id| format!("<#{id}>"))
}

/// Reward members who advertise the server in their status
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("enable", "disable", "role", "match_text", "announce", "status"),
    subcommand_required
)]
pub async fn vanity(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start granting the vanity role
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |c| c.vanity.enabled = true).await?;
    let settings = ctx
        .data()
        .store()
        .get_or_default(scope_id(ctx)?)
        .await?
        .vanity
        .clone();
    let mut reply = String::from("Vanity roles enabled.");
    if settings.role_id.is_none() || settings.match_text.is_none() {
        reply.push_str(" Set a role and the status text to match before it takes effect.");
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Stop granting the vanity role
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |c| c.vanity.enabled = false).await?;
    ctx.say("Vanity roles disabled.").await?;
    Ok(())
}

/// Role given to members with the matching status
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn role(
    ctx: Context<'_>,
    #[description = "Vanity role"] role: Role,
) -> Result<(), Error> {
    if role.managed || role.id.get() == scope_id(ctx)? {
        ctx.say("That role cannot be assigned by the bot.").await?;
        return Ok(());
    }
    let role_id = role.id.get();
    update_config(ctx, move |c| c.vanity.role_id = Some(role_id)).await?;
    ctx.say(format!("Vanity role set to <@&{role_id}>.")).await?;
    Ok(())
}

/// Text the custom status must contain
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "match",
    check = "can_configure"
)]
pub async fn match_text(
    ctx: Context<'_>,
    #[description = "For example your invite link"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let text = text.trim().to_string();
    if text.is_empty() {
        ctx.say("The status text cannot be empty.").await?;
        return Ok(());
    }
    info!(target: COMMAND_TARGET, "{} set vanity match {text:?} in guild {:?}", ctx.author().id, ctx.guild_id());
    let reply = format!("Vanity status text set to `{text}`.");
    update_config(ctx, move |c| c.vanity.match_text = Some(text)).await?;
    ctx.say(reply).await?;
    Ok(())
}

/// Where and how to thank members who pick up the role
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn announce(
    ctx: Context<'_>,
    #[description = "Announcement channel"]
    #[channel_types("Text")]
    channel: GuildChannel,
    #[description = "Supports {user.mention}"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let channel_id = channel.id.get();
    update_config(ctx, move |c| {
        c.vanity.announce_channel_id = Some(channel_id);
        c.vanity.announce_text = Some(text);
    })
    .await?;
    ctx.say(format!("Vanity announcements go to <#{channel_id}>."))
        .await?;
    Ok(())
}

fn vanity_text(settings: &VanitySettings) -> String {
    let mut text = String::from("**Vanity settings**\n");
    let _ = writeln!(text, "Status: {}", on_off(settings.enabled));
    let _ = writeln!(text, "Role: {}", mention_role(settings.role_id));
    let _ = writeln!(
        text,
        "Match: {}",
        settings.match_text.as_deref().unwrap_or("Not set")
    );
    let _ = write!(
        text,
        "Announcements: {}",
        mention_channel(settings.announce_channel_id)
    );
    text
}

/// Show the vanity settings
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(vanity_text(&config.vanity)).await?;
    Ok(())
}

/// Thank members when they boost the server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("booster_enable", "booster_disable", "booster_message", "booster_status"),
    subcommand_required
)]
pub async fn booster(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Start announcing boosts
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "enable",
    check = "can_configure"
)]
pub async fn booster_enable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |c| c.booster.enabled = true).await?;
    ctx.say("Boost announcements enabled.").await?;
    Ok(())
}

/// Stop announcing boosts
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "disable",
    check = "can_configure"
)]
pub async fn booster_disable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |c| c.booster.enabled = false).await?;
    ctx.say("Boost announcements disabled.").await?;
    Ok(())
}

/// Channel and text for boost announcements
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "message",
    check = "can_configure"
)]
pub async fn booster_message(
    ctx: Context<'_>,
    #[description = "Announcement channel"]
    #[channel_types("Text")]
    channel: GuildChannel,
    #[description = "Supports {user.mention}"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let channel_id = channel.id.get();
    update_config(ctx, move |c| {
        c.booster.channel_id = Some(channel_id);
        c.booster.text = Some(text);
    })
    .await?;
    ctx.say(format!("Boost announcements go to <#{channel_id}>."))
        .await?;
    Ok(())
}

fn booster_text(settings: &BoosterSettings) -> String {
    format!(
        "**Booster settings**\nStatus: {}\nChannel: {}\nMessage: {}",
        on_off(settings.enabled),
        mention_channel(settings.channel_id),
        settings.text.as_deref().unwrap_or("Not set")
    )
}

/// Show the boost announcement settings
#[poise::command(prefix_command, slash_command, guild_only, rename = "status")]
pub async fn booster_status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(booster_text(&config.booster)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_names() {
        let names: Vec<String> = vanity().subcommands.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["enable", "disable", "role", "match", "announce", "status"]);

        let names: Vec<String> = booster().subcommands.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["enable", "disable", "message", "status"]);
    }

    #[test]
    fn test_status_texts() {
        let vanity = VanitySettings {
            enabled: true,
            role_id: Some(4),
            match_text: Some("gg/rust".to_string()),
            announce_channel_id: None,
            announce_text: None,
        };
        assert_eq!(
            vanity_text(&vanity),
            "**Vanity settings**\nStatus: enabled\nRole: <@&4>\nMatch: gg/rust\nAnnouncements: Not set"
        );
        assert_eq!(
            booster_text(&BoosterSettings::default()),
            "**Booster settings**\nStatus: disabled\nChannel: Not set\nMessage: Not set"
        );
    }
}
