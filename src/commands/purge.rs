use super::can_configure;
use crate::enforcement::{EnforcementResult, Enforcer, Remediation};
use crate::transcript::{TranscriptLine, render};
use crate::{COMMAND_TARGET, Context, Error};
use poise::serenity_prelude::{CreateAttachment, GetMessages, Message, MessageId};
use tracing::info;

/// Most messages one purge removes
const MAX_PURGE: usize = 200;
/// Channel history searched for matches
const SCAN_LIMIT: usize = 2000;
/// Longest transcript shown inline before it is attached as a file
const INLINE_TRANSCRIPT: usize = 1000;

const USAGE: &str = "Usage: `purge 100`, `purge 100 @user` or `purge 100 bot`";

/// Whose messages a purge removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurgeFilter {
    All,
    Bots,
    User(u64),
}

impl PurgeFilter {
    fn matches(self, author_id: u64, is_bot: bool) -> bool {
        match self {
            Self::All => true,
            Self::Bots => is_bot,
            Self::User(user_id) => author_id == user_id,
        }
    }

    fn describe(self) -> String {
        match self {
            Self::All => "messages".to_string(),
            Self::Bots => "bot messages".to_string(),
            Self::User(user_id) => format!("messages by <@{user_id}>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PurgeRequest {
    count: usize,
    filter: PurgeFilter,
}

/// `<@123>` or `<@!123>`
fn parse_mention(token: &str) -> Option<u64> {
    let inner = token.strip_prefix("<@")?.strip_suffix('>')?;
    inner.trim_start_matches('!').parse().ok()
}

/// Count and filter in either order
fn parse_request(args: &str) -> Result<PurgeRequest, String> {
    let mut count = None;
    let mut filter = PurgeFilter::All;
    for token in args.split_whitespace() {
        if let Ok(n) = token.parse::<usize>() {
            count = Some(n);
        } else if token.eq_ignore_ascii_case("bot") || token.eq_ignore_ascii_case("bots") {
            filter = PurgeFilter::Bots;
        } else if let Some(user_id) = parse_mention(token) {
            filter = PurgeFilter::User(user_id);
        } else {
            return Err(format!("Could not read `{token}`. {USAGE}"));
        }
    }
    match count {
        None => Err(USAGE.to_string()),
        Some(count) if !(1..=MAX_PURGE).contains(&count) => {
            Err(format!("Count must be between 1 and {MAX_PURGE}."))
        }
        Some(count) => Ok(PurgeRequest { count, filter }),
    }
}

/// Delete `messages` from `channel` through the enforcer
async fn remove(
    enforcer: &dyn Enforcer,
    guild_id: u64,
    channel: u64,
    messages: Vec<u64>,
) -> EnforcementResult<usize> {
    let removed = messages.len();
    enforcer
        .remediate(guild_id, &Remediation::DeleteMessages { channel, messages })
        .await?;
    Ok(removed)
}

fn report(moderator: u64, channel: u64, removed: usize, filter: PurgeFilter) -> String {
    format!(
        "**Purge report**\nModerator: <@{moderator}>\nChannel: <#{channel}>\nDeleted: {removed} {}",
        filter.describe()
    )
}

/// Delete recent messages in this channel, optionally only a user's or bots'
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    required_bot_permissions = "MANAGE_MESSAGES"
)]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "How many messages, then optionally @user or bot"]
    #[rest]
    args: String,
) -> Result<(), Error> {
    let request = match parse_request(&args) {
        Ok(request) => request,
        Err(reason) => {
            ctx.say(reason).await?;
            return Ok(());
        }
    };
    let guild_id = ctx.guild_id().ok_or("This command only works in a server")?;
    let channel = ctx.channel_id();
    let http = &ctx.serenity_context().http;

    let mut matched: Vec<Message> = Vec::new();
    let mut before: Option<MessageId> = None;
    let mut scanned = 0;
    while scanned < SCAN_LIMIT && matched.len() < request.count {
        let mut page = GetMessages::new().limit(100);
        if let Some(before) = before {
            page = page.before(before);
        }
        let messages = channel.messages(http, page).await?;
        let Some(last) = messages.last() else {
            break;
        };
        before = Some(last.id);
        scanned += messages.len();
        let wanted = request.count - matched.len();
        matched.extend(
            messages
                .into_iter()
                .filter(|m| request.filter.matches(m.author.id.get(), m.author.bot))
                .take(wanted),
        );
    }
    if matched.is_empty() {
        ctx.say("No messages matched.").await?;
        return Ok(());
    }

    let lines: Vec<TranscriptLine> = matched.iter().map(TranscriptLine::from_message).collect();
    let transcript = render(&lines);
    let ids = matched.iter().map(|m| m.id.get()).collect();
    let removed = remove(
        ctx.data().moderation.enforcer().as_ref(),
        guild_id.get(),
        channel.get(),
        ids,
    )
    .await?;
    info!(
        target: COMMAND_TARGET,
        "{} purged {removed} messages in {channel} of guild {guild_id}",
        ctx.author().id
    );

    let report = report(ctx.author().id.get(), channel.get(), removed, request.filter);
    let reply = if transcript.len() <= INLINE_TRANSCRIPT {
        poise::CreateReply::default().content(format!("{report}\n```\n{transcript}\n```"))
    } else {
        poise::CreateReply::default()
            .content(report)
            .attachment(CreateAttachment::bytes(
                transcript.into_bytes(),
                "purge_transcript.txt",
            ))
    };
    ctx.send(reply).await?;
    Ok(())
}
