//! Opening, claiming and closing tickets through the Discord API

use super::actions::{
    CREATE_ID, Clicker, TicketAction, TicketEvent, action_components, log_line, panel_components,
};
use super::closer::TicketCloser;
use super::settings::{TicketSettings, channel_name, ticket_opener};
use crate::duration::format_seconds;
use crate::transcript::{TranscriptLine, render};
use crate::{Data, EVENT_TARGET, Error, store};
use dashmap::DashMap;
use poise::serenity_prelude::{
    self as serenity, ChannelId, ChannelType, ComponentInteraction, CreateAttachment,
    CreateChannel, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    EditMessage, GetMessages, GuildChannel, GuildId, Http, MessageId, PermissionOverwrite,
    PermissionOverwriteType, Permissions, RoleId, User, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Reason recorded for tickets opened from the panel button
pub const PANEL_REASON: &str = "Opened from the ticket panel";

/// Messages read back for a transcript
const TRANSCRIPT_LIMIT: u8 = 100;

/// Result of asking for a new ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(ChannelId),
    AlreadyOpen(ChannelId),
    NotConfigured,
}

impl OpenOutcome {
    /// Reply shown to the member who asked
    #[must_use]
    pub fn reply(&self) -> String {
        match self {
            Self::Opened(channel) => format!("✅ Ticket created: <#{channel}>"),
            Self::AlreadyOpen(channel) => format!("⚠️ You already have an open ticket: <#{channel}>"),
            Self::NotConfigured => "The ticket system is not set up here.".to_string(),
        }
    }
}

/// Live ticket state: pending closes and who claimed what
#[derive(Clone, Debug, Default)]
pub struct TicketDesk {
    closer: TicketCloser,
    claims: Arc<DashMap<u64, u64>>,
}

impl TicketDesk {
    #[must_use]
    pub fn new(close_delay: Duration) -> Self {
        Self {
            closer: TicketCloser::new(close_delay),
            claims: Arc::default(),
        }
    }

    #[must_use]
    pub fn closer(&self) -> &TicketCloser {
        &self.closer
    }

    /// Claim `channel_id` for `user_id`; the current claimer when already taken
    pub fn claim(&self, channel_id: u64, user_id: u64) -> Result<(), u64> {
        match self.claims.entry(channel_id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(*entry.get()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(user_id);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn claimed_by(&self, channel_id: u64) -> Option<u64> {
        self.claims.get(&channel_id).map(|c| *c)
    }

    /// Drop all state for a deleted ticket
    pub fn forget(&self, channel_id: u64) {
        self.closer.keep(channel_id);
        self.claims.remove(&channel_id);
    }

    /// Delete the ticket after the close delay, posting its transcript to the log channel first
    pub fn schedule_close(
        &self,
        http: Arc<Http>,
        settings: &TicketSettings,
        channel_id: u64,
        closed_by: u64,
    ) -> bool {
        let log_channel = settings.log_channel_id;
        let claims = Arc::clone(&self.claims);
        self.closer.close_with(channel_id, async move {
            info!("Deleting ticket channel {channel_id} closed by {closed_by}");
            let channel = ChannelId::new(channel_id);
            if let Some(log_channel) = log_channel {
                let header = format!("Transcript of closed ticket <#{channel_id}>");
                if let Err(e) = post_transcript(&http, channel, ChannelId::new(log_channel), header).await {
                    warn!("Failed to post transcript of ticket {channel_id}: {e}");
                }
            }
            if let Err(e) = channel.delete(&http).await {
                error!("Failed to delete ticket channel {channel_id}: {e}");
            }
            claims.remove(&channel_id);
        })
    }
}

/// Post `line` to the ticket log channel, if one is set
pub async fn log_event(http: &Http, settings: &TicketSettings, line: String) {
    let Some(log_channel) = settings.log_channel_id else {
        return;
    };
    if let Err(e) = ChannelId::new(log_channel)
        .send_message(http, CreateMessage::new().content(line))
        .await
    {
        warn!(target: EVENT_TARGET, "Failed to write ticket log to {log_channel}: {e}");
    }
}

/// Non-bot messages of a ticket, oldest first
///
/// # Errors
/// Returns an error if the channel history cannot be read
pub async fn channel_transcript(http: &Http, channel: ChannelId) -> Result<String, Error> {
    let messages = channel
        .messages(http, GetMessages::new().limit(TRANSCRIPT_LIMIT))
        .await?;
    let lines: Vec<TranscriptLine> = messages
        .iter()
        .filter(|m| !m.author.bot)
        .map(TranscriptLine::from_message)
        .collect();
    Ok(render(&lines))
}

async fn post_transcript(
    http: &Http,
    channel: ChannelId,
    destination: ChannelId,
    header: String,
) -> Result<(), Error> {
    let text = channel_transcript(http, channel).await?;
    destination
        .send_message(http, transcript_message(channel, header, text))
        .await?;
    Ok(())
}

fn transcript_message(channel: ChannelId, header: String, text: String) -> CreateMessage {
    CreateMessage::new()
        .content(header)
        .add_file(CreateAttachment::bytes(text.into_bytes(), format!("ticket-{channel}.txt")))
}

/// Send the panel to `channel`, editing the existing panel message when it is there
///
/// # Errors
/// Returns an error if the panel cannot be sent
pub async fn send_panel(
    http: &Http,
    channel: ChannelId,
    settings: &TicketSettings,
) -> Result<MessageId, Error> {
    if let (Some(message_id), Some(current)) = (settings.panel_message_id, settings.panel_channel_id)
    {
        if current == channel.get() {
            let edit = EditMessage::new()
                .content(settings.panel_text())
                .components(panel_components(&settings.button_label));
            match channel.edit_message(http, MessageId::new(message_id), edit).await {
                Ok(message) => return Ok(message.id),
                Err(e) => warn!(target: EVENT_TARGET, "Panel {message_id} not editable, sending a new one: {e}"),
            }
        }
    }

    let message = channel
        .send_message(
            http,
            CreateMessage::new()
                .content(settings.panel_text())
                .components(panel_components(&settings.button_label)),
        )
        .await?;
    Ok(message.id)
}

fn staff_overwrite(kind: PermissionOverwriteType) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::MANAGE_CHANNELS,
        deny: Permissions::empty(),
        kind,
    }
}

/// Private to the opener, the ticket moderators, bypass admins and the owner
fn ticket_overwrites(
    guild_id: GuildId,
    opener: UserId,
    owner: UserId,
    mod_role: Option<u64>,
    bypass_admins: impl IntoIterator<Item = u64>,
) -> Vec<PermissionOverwrite> {
    let mut overwrites = vec![
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
        },
        PermissionOverwrite {
            allow: Permissions::VIEW_CHANNEL
                | Permissions::SEND_MESSAGES
                | Permissions::ATTACH_FILES
                | Permissions::EMBED_LINKS,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(opener),
        },
        staff_overwrite(PermissionOverwriteType::Member(owner)),
    ];
    if let Some(role) = mod_role {
        overwrites.push(staff_overwrite(PermissionOverwriteType::Role(RoleId::new(role))));
    }
    overwrites.extend(
        bypass_admins
            .into_iter()
            .filter(|&id| id != owner.get() && id != opener.get())
            .map(|id| staff_overwrite(PermissionOverwriteType::Member(UserId::new(id)))),
    );
    overwrites
}

fn existing_ticket<'a>(
    channels: impl IntoIterator<Item = &'a GuildChannel>,
    opener: UserId,
) -> Option<ChannelId> {
    let topic = ticket_topic(opener);
    channels
        .into_iter()
        .find(|c| {
            ticket_opener(&c.name) == Some(opener.get()) || c.topic.as_deref() == Some(topic.as_str())
        })
        .map(|c| c.id)
}

fn ticket_topic(opener: UserId) -> String {
    format!("Ticket for {opener}")
}

/// Open a private ticket channel for `opener`
///
/// # Errors
/// Returns an error if the guild cannot be read or the channel cannot be created
pub async fn open_ticket(
    http: &Http,
    data: &Data,
    guild_id: GuildId,
    opener: &User,
    reason: &str,
) -> Result<OpenOutcome, Error> {
    let config = data.store().get_or_default(guild_id.get()).await?;
    let settings = &config.tickets;
    if !settings.configured {
        return Ok(OpenOutcome::NotConfigured);
    }

    let channels = guild_id.channels(http).await?;
    if let Some(existing) = existing_ticket(channels.values(), opener.id) {
        return Ok(OpenOutcome::AlreadyOpen(existing));
    }

    let category = match settings.category_id.map(ChannelId::new) {
        Some(id) if channels.get(&id).is_some_and(|c| c.kind == ChannelType::Category) => id,
        _ => {
            let category = guild_id
                .create_channel(
                    http,
                    CreateChannel::new(super::settings::CATEGORY_NAME).kind(ChannelType::Category),
                )
                .await?
                .id;
            let id = category.get();
            store::modify(&**data.store(), guild_id.get(), move |c| {
                c.tickets.category_id = Some(id);
            })
            .await?;
            category
        }
    };

    let owner = guild_id.to_partial_guild(http).await?.owner_id;
    let overwrites = ticket_overwrites(
        guild_id,
        opener.id,
        owner,
        settings.mod_role,
        config.bypass_admins.iter().copied(),
    );
    let channel = guild_id
        .create_channel(
            http,
            CreateChannel::new(channel_name(&opener.name, opener.id.get()))
                .kind(ChannelType::Text)
                .topic(ticket_topic(opener.id))
                .category(category)
                .permissions(overwrites)
                .audit_log_reason("Ticket opened"),
        )
        .await?;
    info!(
        target: EVENT_TARGET,
        "Opened ticket {} for {} in guild {guild_id}", channel.id, opener.id
    );

    let ping = settings
        .mod_role
        .map_or_else(|| format!("<@{owner}>"), |role| format!("<@&{role}>"));
    channel
        .id
        .send_message(
            http,
            CreateMessage::new().content(format!(
                "{ping}\n🎫 **New ticket** from <@{}>\n**Reason:** {reason}",
                opener.id
            )),
        )
        .await?;
    channel
        .id
        .send_message(
            http,
            CreateMessage::new()
                .content("**Ticket actions:**")
                .components(action_components(false)),
        )
        .await?;

    log_event(
        http,
        settings,
        format!(
            "{}\nReason: {reason}",
            log_line(TicketEvent::Created, channel.id.get(), None, opener.id.get(), None)
        ),
    )
    .await;
    Ok(OpenOutcome::Opened(channel.id))
}

async fn respond(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<(), Error> {
    interaction
        .create_response(
            ctx,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn guild_owner(ctx: &serenity::Context, guild_id: GuildId) -> Result<UserId, Error> {
    let cached = ctx.cache.guild(guild_id).map(|g| g.owner_id);
    match cached {
        Some(owner) => Ok(owner),
        None => Ok(guild_id.to_partial_guild(&ctx.http).await?.owner_id),
    }
}

/// Handle the panel and ticket buttons; `false` when the interaction is not a ticket button
///
/// # Errors
/// Returns an error if Discord rejects a response or the configuration cannot be read
pub async fn handle_interaction(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &ComponentInteraction,
) -> Result<bool, Error> {
    let custom_id = interaction.data.custom_id.as_str();
    let action = TicketAction::from_custom_id(custom_id);
    if custom_id != CREATE_ID && action.is_none() {
        return Ok(false);
    }
    let Some(guild_id) = interaction.guild_id else {
        return Ok(false);
    };

    let Some(action) = action else {
        let outcome = open_ticket(&ctx.http, data, guild_id, &interaction.user, PANEL_REASON).await?;
        respond(ctx, interaction, outcome.reply(), true).await?;
        return Ok(true);
    };

    let channel_id = interaction.channel_id;
    let opener = channel_id
        .to_channel(ctx)
        .await?
        .guild()
        .and_then(|c| ticket_opener(&c.name));
    let Some(opener) = opener else {
        respond(ctx, interaction, "This is not a ticket channel.", true).await?;
        return Ok(true);
    };

    let config = data.store().get_or_default(guild_id.get()).await?;
    let settings = &config.tickets;
    let user_id = interaction.user.id;
    let roles = interaction
        .member
        .as_ref()
        .map(|m| m.roles.as_slice())
        .unwrap_or_default();
    let clicker = Clicker {
        is_guild_owner: guild_owner(ctx, guild_id).await? == user_id,
        is_bypass_admin: config.bypass_admins.contains(&user_id.get()),
        has_mod_role: settings
            .mod_role
            .is_some_and(|role| roles.contains(&RoleId::new(role))),
        is_opener: opener == user_id.get(),
    };
    if !clicker.may_use(action) {
        respond(ctx, interaction, "You are not allowed to use this button.", true).await?;
        return Ok(true);
    }

    let tickets = &data.tickets;
    let claimed_by = tickets.claimed_by(channel_id.get());
    match action {
        TicketAction::Delete => {
            respond(ctx, interaction, "Deleting ticket...", true).await?;
            let line = log_line(TicketEvent::Deleted, channel_id.get(), Some(opener), user_id.get(), claimed_by);
            log_event(&ctx.http, settings, line).await;
            tickets.forget(channel_id.get());
            channel_id.delete(ctx).await?;
        }
        TicketAction::Claim => match tickets.claim(channel_id.get(), user_id.get()) {
            Err(current) => {
                respond(ctx, interaction, format!("Already claimed by <@{current}>."), true).await?;
            }
            Ok(()) => {
                respond(
                    ctx,
                    interaction,
                    format!("Ticket claimed by <@{user_id}>. Please wait for them to respond."),
                    false,
                )
                .await?;
                let mut message = (*interaction.message).clone();
                if let Err(e) = message
                    .edit(ctx, EditMessage::new().components(action_components(true)))
                    .await
                {
                    warn!(target: EVENT_TARGET, "Failed to disable claim button in {channel_id}: {e}");
                }
                let line = log_line(TicketEvent::Claimed, channel_id.get(), Some(opener), user_id.get(), None);
                log_event(&ctx.http, settings, line).await;
            }
        },
        TicketAction::Close => {
            tickets.schedule_close(Arc::clone(&ctx.http), settings, channel_id.get(), user_id.get());
            let delay = format_seconds(tickets.closer().delay().as_secs());
            respond(ctx, interaction, format!("Ticket will close in {delay}."), true).await?;
            channel_id
                .say(
                    ctx,
                    format!(
                        "⚠️ This ticket will close in {delay} (closed by <@{user_id}>). Use `ticket keep` to keep it open."
                    ),
                )
                .await?;
            let line = log_line(TicketEvent::Closed, channel_id.get(), Some(opener), user_id.get(), claimed_by);
            log_event(&ctx.http, settings, line).await;
        }
        TicketAction::Transcript => {
            respond(ctx, interaction, "Sending the transcript to your DMs...", true).await?;
            let text = channel_transcript(&ctx.http, channel_id).await?;
            let header = format!("Transcript of ticket <#{channel_id}>");
            if let Err(e) = interaction
                .user
                .direct_message(ctx, transcript_message(channel_id, header.clone(), text.clone()))
                .await
            {
                warn!(target: EVENT_TARGET, "Could not DM transcript to {user_id}: {e}");
            }
            if let Some(log_channel) = settings.log_channel_id {
                ChannelId::new(log_channel)
                    .send_message(ctx, transcript_message(channel_id, header, text))
                    .await?;
            }
            let line = log_line(TicketEvent::Transcript, channel_id.get(), Some(opener), user_id.get(), claimed_by);
            log_event(&ctx.http, settings, line).await;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_first_wins() {
        let desk = TicketDesk::default();
        assert_eq!(desk.claim(5, 10), Ok(()));
        assert_eq!(desk.claim(5, 11), Err(10));
        assert_eq!(desk.claimed_by(5), Some(10));

        desk.forget(5);
        assert_eq!(desk.claimed_by(5), None);
        assert_eq!(desk.claim(5, 11), Ok(()));
    }

    #[test]
    fn test_overwrites_hide_ticket_from_everyone() {
        let overwrites = ticket_overwrites(
            GuildId::new(1),
            UserId::new(7),
            UserId::new(2),
            Some(30),
            [2, 40],
        );

        let everyone = &overwrites[0];
        assert_eq!(everyone.kind, PermissionOverwriteType::Role(RoleId::new(1)));
        assert!(everyone.deny.contains(Permissions::VIEW_CHANNEL));

        let members: Vec<UserId> = overwrites
            .iter()
            .filter_map(|o| match o.kind {
                PermissionOverwriteType::Member(id) => Some(id),
                _ => None,
            })
            .collect();
        // The owner appears once even though they are also a bypass admin
        assert_eq!(members, vec![UserId::new(7), UserId::new(2), UserId::new(40)]);
        assert!(overwrites.iter().any(|o| o.kind == PermissionOverwriteType::Role(RoleId::new(30))
            && o.allow.contains(Permissions::VIEW_CHANNEL)));
    }

    #[test]
    fn test_outcome_replies() {
        let channel = ChannelId::new(9);
        assert_eq!(OpenOutcome::Opened(channel).reply(), "✅ Ticket created: <#9>");
        assert_eq!(
            OpenOutcome::AlreadyOpen(channel).reply(),
            "⚠️ You already have an open ticket: <#9>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_close_is_cancelled_by_forget() {
        let desk = TicketDesk::new(Duration::from_secs(600));
        let http = Arc::new(Http::new(""));
        desk.claim(5, 10).unwrap();

        assert!(!desk.schedule_close(http, &TicketSettings::default(), 5, 10));
        assert!(desk.closer().is_closing(5));

        desk.forget(5);
        assert!(!desk.closer().is_closing(5));
        assert_eq!(desk.claimed_by(5), None);
    }
}
