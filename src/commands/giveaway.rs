use super::{can_configure, scope_id};
use crate::duration::parse_duration;
use crate::giveaway::{ENTRY_EMOJI, GiveawayError, GiveawayRecord, MAX_WINNERS, announcement};
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude::{CreateMessage, ReactionType};
use std::sync::Arc;

/// Timed giveaways
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    subcommands("start", "end", "cancel", "reroll", "info"),
    subcommand_required
)]
pub async fn giveaway(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn parse_message_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|&id| id != 0)
}

fn opening_text(prize: &str, winners: u32, ends_at: i64, host_id: u64) -> String {
    format!(
        "{ENTRY_EMOJI} **GIVEAWAY** {ENTRY_EMOJI}\n**{prize}**\nWinners: {winners}\nEnds <t:{ends_at}:R>\nHosted by <@{host_id}>\nReact with {ENTRY_EMOJI} to enter!"
    )
}

/// Reply for a failed lookup or transition
async fn report(ctx: Context<'_>, error: GiveawayError) -> Result<(), Error> {
    match error {
        GiveawayError::Io(_) | GiveawayError::Yaml(_) => Err(error.into()),
        other => {
            ctx.say(other.to_string()).await?;
            Ok(())
        }
    }
}

/// Start a giveaway in this channel
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn start(
    ctx: Context<'_>,
    #[description = "How long it runs, e.g. 1h or 2d"] duration: String,
    #[description = "Number of winners (1-10)"] winners: u32,
    #[description = "What is being given away"]
    #[rest]
    prize: String,
) -> Result<(), Error> {
    let Some(length) = parse_duration(&duration) else {
        ctx.say("Provide a duration such as `30m`, `1h` or `2d`.")
            .await?;
        return Ok(());
    };
    if !(1..=MAX_WINNERS).contains(&winners) {
        ctx.say(format!("Winners must be between 1 and {MAX_WINNERS}."))
            .await?;
        return Ok(());
    }

    let guild_id = scope_id(ctx)?;
    let host_id = ctx.author().id.get();
    let ends_at = Utc::now() + chrono::Duration::from_std(length)?;

    let http = Arc::clone(&ctx.serenity_context().http);
    let message = ctx
        .channel_id()
        .send_message(
            &http,
            CreateMessage::new().content(opening_text(&prize, winners, ends_at.timestamp(), host_id)),
        )
        .await?;
    message
        .react(&http, ReactionType::Unicode(ENTRY_EMOJI.to_string()))
        .await?;

    let record = GiveawayRecord::new(
        message.id.get(),
        guild_id,
        ctx.channel_id().get(),
        host_id,
        prize,
        winners,
        ends_at,
    )?;
    ctx.data().giveaways.start(http, record).await?;

    if ctx.prefix() == "/" {
        ctx.send(poise::CreateReply::default().content("Giveaway started.").ephemeral(true))
            .await?;
    }
    Ok(())
}

/// End a giveaway now and draw its winners
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn end(
    ctx: Context<'_>,
    #[description = "Giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Some(message_id) = parse_message_id(&message_id) else {
        ctx.say("Provide the giveaway's message id.").await?;
        return Ok(());
    };
    let guild_id = scope_id(ctx)?;
    match ctx
        .data()
        .giveaways
        .conclude(&ctx.serenity_context().http, guild_id, message_id)
        .await
    {
        Ok(record) => {
            ctx.say(format!("Ended the giveaway for **{}**.", record.prize))
                .await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Cancel a running giveaway without drawing winners
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn cancel(
    ctx: Context<'_>,
    #[description = "Giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Some(message_id) = parse_message_id(&message_id) else {
        ctx.say("Provide the giveaway's message id.").await?;
        return Ok(());
    };
    match ctx.data().giveaways.cancel(scope_id(ctx)?, message_id).await {
        Ok(()) => {
            ctx.say("Giveaway cancelled.").await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Draw new winners for an ended giveaway
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn reroll(
    ctx: Context<'_>,
    #[description = "Giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Some(message_id) = parse_message_id(&message_id) else {
        ctx.say("Provide the giveaway's message id.").await?;
        return Ok(());
    };
    match ctx.data().giveaways.reroll(scope_id(ctx)?, message_id).await {
        Ok(record) => {
            ctx.say(announcement(&record, true)).await?;
            Ok(())
        }
        Err(e) => report(ctx, e).await,
    }
}

/// Show a giveaway's state and entrant count
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let guild_id = scope_id(ctx)?;
    let record = parse_message_id(&message_id)
        .and_then(|id| ctx.data().giveaways.store().get_in(guild_id, id));
    let Some(record) = record else {
        ctx.say("No giveaway found for that message.").await?;
        return Ok(());
    };
    ctx.say(info_text(&record)).await?;
    Ok(())
}

fn info_text(record: &GiveawayRecord) -> String {
    let mut text = format!(
        "**{}** ({})\nHost: <@{}>\nEntrants: {}\nWinners: {}\nEnds <t:{}:R>",
        record.prize,
        record.state,
        record.host_id,
        record.entrants.len(),
        record.winner_count,
        record.ends_at.timestamp()
    );
    if !record.winners.is_empty() {
        let mentions: Vec<String> = record.winners.iter().map(|id| format!("<@{id}>")).collect();
        text.push_str(&format!("\nDrawn: {}", mentions.join(" ")));
    }
    text
}
