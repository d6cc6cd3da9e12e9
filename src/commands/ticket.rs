use super::{can_configure, scope_id, update_config};
use crate::duration::format_seconds;
use crate::ticket::settings::{CATEGORY_NAME, PANEL_CHANNEL_NAME};
use crate::ticket::{
    TicketEvent, TicketSettings, log_event, log_line, open_ticket, send_panel, ticket_opener,
};
use crate::{Context, Error};
use poise::serenity_prelude::{ChannelId, ChannelType, CreateChannel, GuildChannel, MessageId, Role};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::warn;

/// Support tickets
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands(
        "set",
        "status",
        "send",
        "mod_role",
        "log",
        "title",
        "description",
        "open",
        "claim",
        "close",
        "keep",
        "delete"
    ),
    subcommand_required
)]
pub async fn ticket(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// The guild's ticket settings once `ticket set` has run
async fn configured(ctx: Context<'_>) -> Result<Option<TicketSettings>, Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    if config.tickets.configured {
        Ok(Some(config.tickets.clone()))
    } else {
        ctx.say("The ticket system is not set up. Run `ticket set` first.")
            .await?;
        Ok(None)
    }
}

/// Store `settings` as the guild's ticket settings
async fn save(ctx: Context<'_>, settings: TicketSettings) -> Result<(), Error> {
    update_config(ctx, move |c| c.tickets = settings).await
}

/// Re-render the panel where it currently lives
async fn refresh_panel(ctx: Context<'_>, mut settings: TicketSettings) -> Result<(), Error> {
    if let Some(channel) = settings.panel_channel_id {
        let message = send_panel(&ctx.serenity_context().http, ChannelId::new(channel), &settings).await?;
        settings.panel_message_id = Some(message.get());
    }
    save(ctx, settings).await
}

fn status_text(settings: &TicketSettings) -> String {
    let channel = |id: Option<u64>| id.map_or_else(|| "None".to_string(), |id| format!("<#{id}>"));
    let mut text = String::from("**Ticket status**\n");
    let _ = writeln!(text, "Category: {}", channel(settings.category_id));
    let _ = writeln!(text, "Panel channel: {}", channel(settings.panel_channel_id));
    let _ = writeln!(text, "Log channel: {}", channel(settings.log_channel_id));
    let _ = writeln!(
        text,
        "Ticket mod: {}",
        settings
            .mod_role
            .map_or_else(|| "None".to_string(), |id| format!("<@&{id}>"))
    );
    let _ = writeln!(text, "Title: {}", settings.title);
    let _ = writeln!(text, "Button: {}", settings.button_label);
    let _ = write!(text, "Description: {}", settings.description);
    text
}

/// Set up the ticket panel, creating the category and panel channel when not given
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Category for new tickets"]
    #[channel_types("Category")]
    category: Option<GuildChannel>,
    #[description = "Channel for the panel"]
    #[channel_types("Text")]
    channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let http = &ctx.serenity_context().http;

    let existing = ctx.data().store().get_or_default(guild_id.get()).await?;
    if let (Some(panel_channel), Some(_)) = (
        existing.tickets.panel_channel_id,
        existing.tickets.panel_message_id,
    ) {
        if guild_id
            .channels(http)
            .await?
            .contains_key(&ChannelId::new(panel_channel))
        {
            ctx.say(format!(
                "A ticket panel already exists in <#{panel_channel}>. Use `ticket send #channel` to move it."
            ))
            .await?;
            return Ok(());
        }
    }

    if category.as_ref().is_some_and(|c| c.kind != ChannelType::Category) {
        ctx.say("That is not a category.").await?;
        return Ok(());
    }
    let category = match category {
        Some(category) => category.id,
        None => {
            guild_id
                .create_channel(http, CreateChannel::new(CATEGORY_NAME).kind(ChannelType::Category))
                .await?
                .id
        }
    };
    let channel = match channel {
        Some(channel) => channel.id,
        None => {
            guild_id
                .create_channel(
                    http,
                    CreateChannel::new(PANEL_CHANNEL_NAME)
                        .kind(ChannelType::Text)
                        .category(category),
                )
                .await?
                .id
        }
    };

    let mut settings = TicketSettings::configure(category.get(), channel.get());
    settings.panel_message_id = Some(send_panel(http, channel, &settings).await?.get());
    save(ctx, settings).await?;
    ctx.say(format!("Ticket panel set up in <#{channel}>.")).await?;
    Ok(())
}

/// Show the ticket settings
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    if !config.tickets.configured {
        ctx.say("The ticket system is not set up. Run `ticket set` first.")
            .await?;
        return Ok(());
    }
    ctx.say(status_text(&config.tickets)).await?;
    Ok(())
}

/// Send the panel to a channel, moving it if it was elsewhere
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn send(
    ctx: Context<'_>,
    #[description = "Channel for the panel"]
    #[channel_types("Text")]
    channel: GuildChannel,
) -> Result<(), Error> {
    let Some(mut settings) = configured(ctx).await? else {
        return Ok(());
    };
    let http = &ctx.serenity_context().http;

    if let (Some(old_channel), Some(old_message)) = (settings.panel_channel_id, settings.panel_message_id) {
        if old_channel != channel.id.get() {
            if let Err(e) = ChannelId::new(old_channel)
                .delete_message(http, MessageId::new(old_message))
                .await
            {
                warn!("Could not remove old ticket panel {old_message}: {e}");
            }
            settings.panel_message_id = None;
        }
    }

    settings.panel_channel_id = Some(channel.id.get());
    refresh_panel(ctx, settings).await?;
    ctx.say(format!("Ticket panel sent to <#{}>.", channel.id)).await?;
    Ok(())
}

/// Role pinged on new tickets and allowed to manage them
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "mod",
    check = "can_configure"
)]
pub async fn mod_role(
    ctx: Context<'_>,
    #[description = "Ticket moderator role"] role: Role,
) -> Result<(), Error> {
    let Some(mut settings) = configured(ctx).await? else {
        return Ok(());
    };
    settings.mod_role = Some(role.id.get());
    save(ctx, settings).await?;
    ctx.say(format!("Ticket mod set to <@&{}>.", role.id)).await?;
    Ok(())
}

/// Channel that receives ticket logs and transcripts
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn log(
    ctx: Context<'_>,
    #[description = "Log channel"]
    #[channel_types("Text")]
    channel: GuildChannel,
) -> Result<(), Error> {
    let Some(mut settings) = configured(ctx).await? else {
        return Ok(());
    };
    settings.log_channel_id = Some(channel.id.get());
    save(ctx, settings).await?;
    ctx.say(format!("Ticket log channel set to <#{}>.", channel.id))
        .await?;
    Ok(())
}

/// Change the panel title
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn title(
    ctx: Context<'_>,
    #[description = "New title"]
    #[rest]
    value: String,
) -> Result<(), Error> {
    let Some(mut settings) = configured(ctx).await? else {
        return Ok(());
    };
    settings.title = value.trim().to_string();
    refresh_panel(ctx, settings).await?;
    ctx.say("Ticket panel title updated.").await?;
    Ok(())
}

/// Change the panel description
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn description(
    ctx: Context<'_>,
    #[description = "New description"]
    #[rest]
    value: String,
) -> Result<(), Error> {
    let Some(mut settings) = configured(ctx).await? else {
        return Ok(());
    };
    settings.description = value.trim().to_string();
    refresh_panel(ctx, settings).await?;
    ctx.say("Ticket panel description updated.").await?;
    Ok(())
}

/// Open a ticket
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn open(
    ctx: Context<'_>,
    #[description = "What you need help with"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let reason = reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided");
    let outcome = open_ticket(
        &ctx.serenity_context().http,
        ctx.data(),
        guild_id,
        ctx.author(),
        reason,
    )
    .await?;
    ctx.send(
        poise::CreateReply::default()
            .content(outcome.reply())
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Id and opener of the invoking channel when it is a ticket
async fn ticket_channel(ctx: Context<'_>) -> Result<Option<(u64, u64)>, Error> {
    let channel = ctx.guild_channel().await;
    match channel.and_then(|c| ticket_opener(&c.name).map(|opener| (c.id.get(), opener))) {
        Some(ticket) => Ok(Some(ticket)),
        None => {
            ctx.say("This command only works in a ticket channel.").await?;
            Ok(None)
        }
    }
}

/// Claim this ticket
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn claim(ctx: Context<'_>) -> Result<(), Error> {
    let Some((channel_id, opener)) = ticket_channel(ctx).await? else {
        return Ok(());
    };
    let author = ctx.author().id.get();
    match ctx.data().tickets.claim(channel_id, author) {
        Err(current) => {
            ctx.say(format!("Already claimed by <@{current}>.")).await?;
        }
        Ok(()) => {
            ctx.say(format!(
                "Ticket claimed by <@{author}>. Please wait for them to respond."
            ))
            .await?;
            let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
            let line = log_line(TicketEvent::Claimed, channel_id, Some(opener), author, None);
            log_event(&ctx.serenity_context().http, &config.tickets, line).await;
        }
    }
    Ok(())
}

/// Close this ticket after a grace period
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    let Some((channel_id, opener)) = ticket_channel(ctx).await? else {
        return Ok(());
    };

    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    let tickets = &ctx.data().tickets;
    let http = Arc::clone(&ctx.serenity_context().http);
    let author = ctx.author().id.get();
    tickets.schedule_close(Arc::clone(&http), &config.tickets, channel_id, author);
    ctx.say(format!(
        "This ticket will close in {} (closed by <@{author}>). Use `ticket keep` to keep it open.",
        format_seconds(tickets.closer().delay().as_secs()),
    ))
    .await?;
    let line = log_line(
        TicketEvent::Closed,
        channel_id,
        Some(opener),
        author,
        tickets.claimed_by(channel_id),
    );
    log_event(&http, &config.tickets, line).await;
    Ok(())
}

/// Keep this ticket open, cancelling a pending close
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn keep(ctx: Context<'_>) -> Result<(), Error> {
    let Some((channel_id, _)) = ticket_channel(ctx).await? else {
        return Ok(());
    };

    if ctx.data().tickets.closer().keep(channel_id) {
        ctx.say("Ticket kept open.").await?;
    } else {
        ctx.say("This ticket is not closing.").await?;
    }
    Ok(())
}

/// Delete this ticket immediately
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn delete(ctx: Context<'_>) -> Result<(), Error> {
    let Some((channel_id, opener)) = ticket_channel(ctx).await? else {
        return Ok(());
    };

    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    let tickets = &ctx.data().tickets;
    let author = ctx.author().id.get();
    let line = log_line(
        TicketEvent::Deleted,
        channel_id,
        Some(opener),
        author,
        tickets.claimed_by(channel_id),
    );
    log_event(&ctx.serenity_context().http, &config.tickets, line).await;
    tickets.forget(channel_id);
    ctx.say("Deleting ticket...").await?;
    ctx.channel_id().delete(&ctx.serenity_context().http).await?;
    Ok(())
}
