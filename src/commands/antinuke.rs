use super::{can_configure, on_off, scope_id, threshold_cap, update_config};
use crate::duration::format_seconds;
use crate::moderation::{
    CategoryFamily, GuildModerationConfig, PunishmentAction, ViolationCategory, parse_directive,
};
use crate::{Context, Error, store};
use poise::serenity_prelude as serenity;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ListAction {
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
}

/// Anti-nuke settings
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    subcommands(
        "enable",
        "disable",
        "status",
        "config",
        "whitelist",
        "setmod",
        "modrole",
        "mods",
        "bypass",
        "logchannel",
        "reset"
    ),
    subcommand_required
)]
pub async fn antinuke(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Turn anti-nuke protection on
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |config| config.enabled = true).await?;
    ctx.say("Anti-nuke protection enabled.").await?;
    Ok(())
}

/// Turn anti-nuke protection off
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |config| config.enabled = false).await?;
    ctx.say("Anti-nuke protection disabled.").await?;
    Ok(())
}

/// Restore every category policy to its default
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, GuildModerationConfig::seed_defaults).await?;
    ctx.say("Every category policy is back to its default.").await?;
    Ok(())
}

/// Show every anti-nuke category and its policy
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(status_report(&config)).await?;
    Ok(())
}

/// Configure a category, e.g. `mass mention enable 3 timeout 10m`
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    aliases("set")
)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "<category> [enable|disable] [threshold] [ban|kick|strip|timeout [duration]]"]
    #[rest]
    directive: String,
) -> Result<(), Error> {
    let mut directive = match parse_directive(&directive) {
        Ok(directive) => directive,
        Err(e) => {
            ctx.say(e.to_string()).await?;
            return Ok(());
        }
    };

    let category = directive.category;
    let capacity = threshold_cap(ctx, category);
    let capped = directive.cap_threshold(capacity);
    let updated = store::modify(&**ctx.data().store(), scope_id(ctx)?, move |config| {
        directive.apply(config);
    })
    .await?;

    let mut reply = format!(
        "Updated **{category}**: {}",
        describe_policy(&updated, category)
    );
    if capped {
        let _ = write!(
            reply,
            "\nThreshold lowered to {capacity}, the most this category can count in its window."
        );
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Add or remove a member from the whitelist
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn whitelist(
    ctx: Context<'_>,
    #[description = "add or remove"] action: ListAction,
    #[description = "Member to trust"] user: serenity::User,
) -> Result<(), Error> {
    let user_id = user.id.get();
    update_config(ctx, move |config| match action {
        ListAction::Add => {
            config.whitelist.insert(user_id);
        }
        ListAction::Remove => {
            config.whitelist.remove(&user_id);
        }
    })
    .await?;

    let verb = match action {
        ListAction::Add => "added to",
        ListAction::Remove => "removed from",
    };
    ctx.say(format!("{} {verb} the anti-nuke whitelist.", user.name))
        .await?;
    Ok(())
}

/// Set the role exempt from every anti-nuke category
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn setmod(
    ctx: Context<'_>,
    #[description = "Anti-nuke moderator role"] role: serenity::Role,
) -> Result<(), Error> {
    let role_id = role.id.get();
    update_config(ctx, move |config| config.moderator_role = Some(role_id)).await?;
    ctx.say(format!("Anti-nuke moderator role set to **{}**.", role.name))
        .await?;
    Ok(())
}

/// Set the role exempt from one category
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn modrole(
    ctx: Context<'_>,
    #[description = "Role to exempt"] role: serenity::Role,
    #[description = "Category, e.g. \"mass ban\""]
    #[rest]
    category: String,
) -> Result<(), Error> {
    let Some(category) = ViolationCategory::find_in(&category.to_lowercase()) else {
        ctx.say(format!("Unknown category `{category}`.")).await?;
        return Ok(());
    };

    let role_id = role.id.get();
    update_config(ctx, move |config| {
        config.category_moderator_roles.insert(category, role_id);
    })
    .await?;
    ctx.say(format!("**{}** is now exempt from **{category}**.", role.name))
        .await?;
    Ok(())
}

/// List moderator roles
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn mods(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(moderator_report(&config)).await?;
    Ok(())
}

/// Add or remove a bypass administrator
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn bypass(
    ctx: Context<'_>,
    #[description = "add or remove"] action: ListAction,
    #[description = "Member trusted like the owner"] user: serenity::User,
) -> Result<(), Error> {
    // Only the owner tier may hand out owner-level trust
    let caller = ctx.author().id.get();
    let is_owner = ctx.data().settings.is_owner(caller)
        || ctx.guild().is_some_and(|g| g.owner_id.get() == caller);
    if !is_owner {
        ctx.say("Only the server owner can change bypass administrators.")
            .await?;
        return Ok(());
    }

    let user_id = user.id.get();
    update_config(ctx, move |config| match action {
        ListAction::Add => {
            config.bypass_admins.insert(user_id);
        }
        ListAction::Remove => {
            config.bypass_admins.remove(&user_id);
        }
    })
    .await?;
    ctx.say(format!(
        "{} is {} a bypass administrator.",
        user.name,
        match action {
            ListAction::Add => "now",
            ListAction::Remove => "no longer",
        }
    ))
    .await?;
    Ok(())
}

/// Report enforcement in a channel; omit the channel to stop
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn logchannel(
    ctx: Context<'_>,
    #[description = "Channel for enforcement reports"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let channel_id = channel.as_ref().map(|c| c.id.get());
    update_config(ctx, move |config| config.log_channel_id = channel_id).await?;
    match channel_id {
        Some(id) => ctx.say(format!("Enforcement reports go to <#{id}>.")).await?,
        None => ctx.say("Enforcement reports turned off.").await?,
    };
    Ok(())
}

fn describe_policy(config: &GuildModerationConfig, category: ViolationCategory) -> String {
    let policy = config.policy(category);
    let action = if policy.action == PunishmentAction::Timeout {
        format!("timeout {}", format_seconds(policy.effective_timeout()))
    } else {
        policy.action.to_string()
    };
    format!(
        "{}, threshold {}, {action}",
        on_off(policy.enabled),
        policy.threshold
    )
}

fn status_report(config: &GuildModerationConfig) -> String {
    let mut out = format!("Anti-nuke is **{}**\n", on_off(config.enabled));
    for category in ViolationCategory::ALL
        .into_iter()
        .filter(|c| c.family() == CategoryFamily::AntiNuke)
    {
        let _ = writeln!(out, "{category}: {}", describe_policy(config, category));
    }
    let _ = write!(out, "Whitelisted members: {}", config.whitelist.len());
    out
}

fn moderator_report(config: &GuildModerationConfig) -> String {
    let mut out = match config.moderator_role {
        Some(role) => format!("General moderator role: <@&{role}>"),
        None => "General moderator role: not set".to_string(),
    };
    for (category, role) in &config.category_moderator_roles {
        let _ = write!(out, "\n{category}: <@&{role}>");
    }
    out
}
