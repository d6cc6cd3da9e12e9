use super::{can_configure, scope_id, update_config};
use crate::enforcement::{get_guild_and_member, top_position};
use crate::jail::{
    JAIL_CHANNEL_NAME, JAIL_ROLE_COLOUR, JAIL_ROLE_NAME, JailRecord, JailSettings, JailTarget,
};
use crate::{COMMAND_TARGET, Context, Error};
use chrono::Utc;
use poise::serenity_prelude::{
    ChannelId, ChannelType, CreateChannel, EditMember, EditRole, GuildId, Http, Member,
    PartialGuild, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, User,
};
use std::fmt::Write as _;
use tracing::{info, warn};

/// Confine members to a jail channel
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    subcommands("add", "release", "list", "status", "setup", "teardown"),
    subcommand_required
)]
pub async fn jail(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn jail_settings(ctx: Context<'_>) -> Result<JailSettings, Error> {
    Ok(ctx.data().store().get_or_default(scope_id(ctx)?).await?.jail.clone())
}

/// Whether `roles` (or @everyone) grant administrator
fn holds_administrator(guild: &PartialGuild, roles: &[RoleId]) -> bool {
    let everyone = RoleId::new(guild.id.get());
    roles
        .iter()
        .chain(std::iter::once(&everyone))
        .filter_map(|id| guild.roles.get(id))
        .any(|role| role.permissions.administrator())
}

/// Every channel but the jail hides itself from the jail role
fn jail_overwrite(jail_role: RoleId, in_jail: bool) -> PermissionOverwrite {
    let access = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
    PermissionOverwrite {
        allow: if in_jail { access } else { Permissions::empty() },
        deny: if in_jail { Permissions::empty() } else { access },
        kind: PermissionOverwriteType::Role(jail_role),
    }
}

/// Find or create the jail role and channel, and lock the jail role out of everything else
async fn build_jail(http: &Http, guild_id: GuildId) -> Result<(RoleId, ChannelId), Error> {
    let guild = guild_id.to_partial_guild(http).await?;
    let role = match guild.roles.values().find(|r| r.name == JAIL_ROLE_NAME) {
        Some(role) => role.id,
        None => {
            guild_id
                .create_role(
                    http,
                    EditRole::new()
                        .name(JAIL_ROLE_NAME)
                        .colour(JAIL_ROLE_COLOUR)
                        .audit_log_reason("Jail setup"),
                )
                .await?
                .id
        }
    };

    let channels = guild_id.channels(http).await?;
    let jail_channel = match channels.values().find(|c| c.name == JAIL_CHANNEL_NAME) {
        Some(channel) => channel.id,
        None => {
            guild_id
                .create_channel(
                    http,
                    CreateChannel::new(JAIL_CHANNEL_NAME)
                        .kind(ChannelType::Text)
                        .topic("Jail channel for jailed members")
                        .permissions(vec![
                            PermissionOverwrite {
                                allow: Permissions::empty(),
                                deny: Permissions::VIEW_CHANNEL,
                                kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
                            },
                            jail_overwrite(role, true),
                        ])
                        .audit_log_reason("Jail setup"),
                )
                .await?
                .id
        }
    };

    for channel in channels.keys().filter(|&&id| id != jail_channel) {
        if let Err(e) = channel.create_permission(http, jail_overwrite(role, false)).await {
            warn!(target: COMMAND_TARGET, "Could not hide {channel} from the jail role: {e}");
        }
    }
    Ok((role, jail_channel))
}

/// Create the jail role and channel
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn setup(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    ctx.defer().await?;
    let (role, channel) = build_jail(&ctx.serenity_context().http, guild_id).await?;
    update_config(ctx, move |c| {
        c.jail.enabled = true;
        c.jail.role_id = Some(role.get());
        c.jail.channel_id = Some(channel.get());
    })
    .await?;
    ctx.say(format!(
        "Jail enabled with role <@&{role}> and channel <#{channel}>."
    ))
    .await?;
    Ok(())
}

/// Delete the jail role and channel
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn teardown(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let settings = jail_settings(ctx).await?;
    if !settings.enabled {
        ctx.say("The jail is not set up.").await?;
        return Ok(());
    }
    if !settings.jailed.is_empty() {
        ctx.say(format!(
            "{} member(s) are still jailed. Release them first.",
            settings.jailed.len()
        ))
        .await?;
        return Ok(());
    }

    let http = &ctx.serenity_context().http;
    if let Some(channel) = settings.channel_id {
        if let Err(e) = ChannelId::new(channel).delete(http).await {
            warn!(target: COMMAND_TARGET, "Could not delete jail channel {channel}: {e}");
        }
    }
    if let Some(role) = settings.role_id {
        if let Err(e) = guild_id.delete_role(http, RoleId::new(role)).await {
            warn!(target: COMMAND_TARGET, "Could not delete jail role {role}: {e}");
        }
    }
    update_config(ctx, |c| c.jail = JailSettings::default()).await?;
    ctx.say("Jail removed.").await?;
    Ok(())
}

fn status_text(settings: &JailSettings) -> String {
    let mut text = String::from("**Jail status**\n");
    let _ = writeln!(
        text,
        "Status: {}",
        if settings.enabled { "Enabled" } else { "Disabled" }
    );
    let _ = writeln!(
        text,
        "Jail role: {}",
        settings
            .role_id
            .map_or_else(|| "Not set".to_string(), |id| format!("<@&{id}>"))
    );
    let _ = write!(
        text,
        "Jail channel: {}",
        settings
            .channel_id
            .map_or_else(|| "Not set".to_string(), |id| format!("<#{id}>"))
    );
    text
}

/// Show the jail settings
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let settings = jail_settings(ctx).await?;
    ctx.say(status_text(&settings)).await?;
    Ok(())
}

fn list_text(settings: &JailSettings) -> String {
    if settings.jailed.is_empty() {
        return "No members are jailed.".to_string();
    }
    let mut text = String::from("**Jailed members**\n");
    for (user_id, record) in &settings.jailed {
        let _ = writeln!(
            text,
            "<@{user_id}> by <@{}> <t:{}:R>: {}",
            record.jailed_by,
            record.jailed_at.timestamp(),
            record.reason
        );
    }
    text
}

/// List jailed members
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let settings = jail_settings(ctx).await?;
    ctx.say(list_text(&settings)).await?;
    Ok(())
}

async fn jail_target(http: &Http, guild: &PartialGuild, member: &Member) -> Result<JailTarget, Error> {
    let bot_id = http.get_current_user().await?.id;
    let bot_member = guild.id.member(http, bot_id).await?;
    Ok(JailTarget {
        user_id: member.user.id.get(),
        is_bot: member.user.bot,
        is_owner: guild.owner_id == member.user.id,
        is_admin: holds_administrator(guild, &member.roles),
        top_position: top_position(guild, &member.roles),
        bot_top_position: top_position(guild, &bot_member.roles),
    })
}

/// Jail a member, saving their roles
#[poise::command(prefix_command, slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Member to jail"] user: User,
    #[description = "Why"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let http = &ctx.serenity_context().http;
    let reason = reason.unwrap_or_else(|| "No reason provided".to_string());
    let settings = jail_settings(ctx).await?;

    let (guild, member) = get_guild_and_member(http, guild_id, user.id).await?;
    let target = jail_target(http, &guild, &member).await?;
    if let Err(refusal) = settings.check(&target) {
        ctx.say(refusal.to_string()).await?;
        return Ok(());
    }
    let Some((role, channel)) = settings.cell() else {
        return Ok(());
    };

    let record = JailRecord {
        roles: member
            .roles
            .iter()
            .map(|r| r.get())
            .filter(|&r| r != role)
            .collect(),
        reason: reason.clone(),
        jailed_by: ctx.author().id.get(),
        jailed_at: Utc::now(),
    };
    guild_id
        .edit_member(
            http,
            user.id,
            EditMember::new()
                .roles(vec![RoleId::new(role)])
                .audit_log_reason(&reason),
        )
        .await?;
    let user_id = user.id.get();
    update_config(ctx, move |c| {
        c.jail.jailed.insert(user_id, record);
    })
    .await?;
    info!(target: COMMAND_TARGET, "{} jailed {user_id} in guild {guild_id}", ctx.author().id);

    ChannelId::new(channel)
        .say(
            http,
            format!(
                "🔒 <@{user_id}>, you have been jailed by <@{}>.\n**Reason:** {reason}\nYou can only see this channel while jailed.",
                ctx.author().id
            ),
        )
        .await?;
    ctx.say(format!("🔒 <@{user_id}> has been jailed in <#{channel}>."))
        .await?;
    Ok(())
}

/// Release a jailed member and give back their roles
#[poise::command(prefix_command, slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn release(
    ctx: Context<'_>,
    #[description = "Member to release"] user: User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let http = &ctx.serenity_context().http;
    let settings = jail_settings(ctx).await?;
    let Some(record) = settings.jailed.get(&user.id.get()) else {
        ctx.say(format!("<@{}> is not jailed.", user.id)).await?;
        return Ok(());
    };

    let guild = guild_id.to_partial_guild(http).await?;
    let roles = settings.restorable_roles(record, |id| guild.roles.contains_key(&RoleId::new(id)));
    let lost = record.roles.len() - roles.len();
    guild_id
        .edit_member(
            http,
            user.id,
            EditMember::new()
                .roles(roles.iter().copied().map(RoleId::new).collect::<Vec<_>>())
                .audit_log_reason("Released from jail"),
        )
        .await?;
    let user_id = user.id.get();
    update_config(ctx, move |c| {
        c.jail.jailed.remove(&user_id);
    })
    .await?;
    info!(target: COMMAND_TARGET, "{} released {user_id} in guild {guild_id}", ctx.author().id);

    let mut reply = format!("🔓 <@{user_id}> released with {} role(s) restored.", roles.len());
    if lost > 0 {
        let _ = write!(reply, " {lost} saved role(s) no longer exist.");
    }
    ctx.say(reply).await?;
    Ok(())
}
