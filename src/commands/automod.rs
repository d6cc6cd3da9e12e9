use super::{can_configure, on_off, scope_id, threshold_cap, update_config};
use crate::duration::{format_seconds, parse_duration};
use crate::moderation::{GuildModerationConfig, PunishmentAction, ViolationCategory};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum WordsAction {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
    #[name = "list"]
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum SpamAction {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
    #[name = "rate"]
    Rate,
    #[name = "timeout"]
    Timeout,
    #[name = "purge"]
    Purge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum RepeatAction {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
    #[name = "threshold"]
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Toggle {
    #[name = "on"]
    On,
    #[name = "off"]
    Off,
}

/// A validated auto-mod change
#[derive(Debug, Clone, PartialEq, Eq)]
enum Setting {
    Words(bool),
    AddWord(String),
    RemoveWord(String),
    Spam(bool),
    SpamRate(u32),
    SpamTimeout(u64),
    SpamPurge(u32),
    Repeat(bool),
    RepeatThreshold(u32),
}

impl Setting {
    fn apply(self, config: &mut GuildModerationConfig) {
        let automod = &mut config.automod;
        match self {
            Self::Words(enabled) => automod.words.enabled = enabled,
            Self::AddWord(word) => {
                if !automod.words.list.contains(&word) {
                    automod.words.list.push(word);
                }
            }
            Self::RemoveWord(word) => automod.words.list.retain(|w| *w != word),
            Self::Spam(enabled) => config.policy_mut(ViolationCategory::SpamMessage).enabled = enabled,
            Self::SpamRate(rate) => config.policy_mut(ViolationCategory::SpamMessage).threshold = rate,
            Self::SpamTimeout(seconds) => {
                let policy = config.policy_mut(ViolationCategory::SpamMessage);
                policy.action = PunishmentAction::Timeout;
                policy.timeout_seconds = seconds;
            }
            Self::SpamPurge(max) => automod.spam_delete_max = max,
            Self::Repeat(enabled) => automod.repeat.enabled = enabled,
            Self::RepeatThreshold(n) => automod.repeat.min_repeats = n,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Words(enabled) => format!("Word filter {}.", on_off(*enabled)),
            Self::AddWord(word) => format!("Added `{word}` to the word filter."),
            Self::RemoveWord(word) => format!("Removed `{word}` from the word filter."),
            Self::Spam(enabled) => format!("Spam protection {}.", on_off(*enabled)),
            Self::SpamRate(rate) => format!("Spam limit set to {rate} messages in the window."),
            Self::SpamTimeout(seconds) => {
                format!("Spammers are timed out for {}.", format_seconds(*seconds))
            }
            Self::SpamPurge(max) => format!("Up to {max} spam messages are removed."),
            Self::Repeat(enabled) => format!("Repeat filter {}.", on_off(*enabled)),
            Self::RepeatThreshold(n) => format!("Messages repeating a word {n} times are removed."),
        }
    }
}

fn parse_count(value: Option<&str>, range: std::ops::RangeInclusive<u32>) -> Result<u32, String> {
    let raw = value.ok_or_else(|| "Provide a number.".to_string())?;
    let n: u32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number."))?;
    Ok(n.clamp(*range.start(), *range.end()))
}

fn words_setting(action: WordsAction, word: Option<&str>) -> Result<Setting, String> {
    let word = || {
        word.map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .ok_or_else(|| "Provide a word.".to_string())
    };
    match action {
        WordsAction::Enable => Ok(Setting::Words(true)),
        WordsAction::Disable => Ok(Setting::Words(false)),
        WordsAction::Add => Ok(Setting::AddWord(word()?)),
        WordsAction::Remove => Ok(Setting::RemoveWord(word()?)),
        WordsAction::List => Err("Listing does not change settings.".to_string()),
    }
}

/// `max_rate` is the spam window's capacity, capped at 50
fn spam_setting(action: SpamAction, value: Option<&str>, max_rate: usize) -> Result<Setting, String> {
    match action {
        SpamAction::Enable => Ok(Setting::Spam(true)),
        SpamAction::Disable => Ok(Setting::Spam(false)),
        SpamAction::Rate => {
            let max_rate = u32::try_from(max_rate).unwrap_or(u32::MAX).clamp(2, 50);
            parse_count(value, 2..=max_rate).map(Setting::SpamRate)
        }
        SpamAction::Purge => parse_count(value, 1..=100).map(Setting::SpamPurge),
        SpamAction::Timeout => value
            .and_then(parse_duration)
            .map(|d| Setting::SpamTimeout(d.as_secs()))
            .ok_or_else(|| "Provide a duration such as `10m` or `1h`.".to_string()),
    }
}

fn repeat_setting(action: RepeatAction, value: Option<&str>) -> Result<Setting, String> {
    match action {
        RepeatAction::Enable => Ok(Setting::Repeat(true)),
        RepeatAction::Disable => Ok(Setting::Repeat(false)),
        RepeatAction::Threshold => parse_count(value, 2..=15).map(Setting::RepeatThreshold),
    }
}

/// Validate, persist and confirm a change
async fn apply_setting(ctx: Context<'_>, setting: Result<Setting, String>) -> Result<(), Error> {
    match setting {
        Ok(setting) => {
            let reply = setting.describe();
            update_config(ctx, move |config| setting.apply(config)).await?;
            ctx.say(reply).await?;
        }
        Err(message) => {
            ctx.say(message).await?;
        }
    }
    Ok(())
}

/// Auto-moderation settings
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    subcommands("status", "words", "spam", "repeat", "moderator", "bypass"),
    subcommand_required
)]
pub async fn automod(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the auto-mod configuration
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
    ctx.say(status_report(&config)).await?;
    Ok(())
}

/// Manage the blacklisted-word filter
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn words(
    ctx: Context<'_>,
    #[description = "enable, disable, add, remove or list"] action: WordsAction,
    #[description = "Word to add or remove"]
    #[rest]
    word: Option<String>,
) -> Result<(), Error> {
    if action == WordsAction::List {
        let config = ctx.data().store().get_or_default(scope_id(ctx)?).await?;
        let list = &config.automod.words.list;
        let reply = if list.is_empty() {
            "No blacklisted words.".to_string()
        } else {
            format!("Blacklisted words: {}", list.join(", "))
        };
        ctx.say(reply).await?;
        return Ok(());
    }
    apply_setting(ctx, words_setting(action, word.as_deref())).await
}

/// Configure the message spam limiter
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn spam(
    ctx: Context<'_>,
    #[description = "enable, disable, rate, timeout or purge"] action: SpamAction,
    #[description = "Rate (2 up to the spam window size), timeout duration or purge count (1-100)"]
    value: Option<String>,
) -> Result<(), Error> {
    let max_rate = threshold_cap(ctx, ViolationCategory::SpamMessage);
    apply_setting(ctx, spam_setting(action, value.as_deref(), max_rate)).await
}

/// Configure the repeated-word filter
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn repeat(
    ctx: Context<'_>,
    #[description = "enable, disable or threshold"] action: RepeatAction,
    #[description = "Repeats before a message is removed (2-15)"] value: Option<String>,
) -> Result<(), Error> {
    apply_setting(ctx, repeat_setting(action, value.as_deref())).await
}

/// Set the role that bypasses auto-mod
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    check = "can_configure",
    rename = "mod"
)]
pub async fn moderator(
    ctx: Context<'_>,
    #[description = "Auto-mod moderator role"] role: serenity::Role,
) -> Result<(), Error> {
    let role_id = role.id.get();
    update_config(ctx, move |config| config.automod.mod_role = Some(role_id)).await?;
    ctx.say(format!("**{}** now bypasses auto-mod.", role.name))
        .await?;
    Ok(())
}

/// Let staff bypass auto-mod
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn bypass(
    ctx: Context<'_>,
    #[description = "on or off"] state: Toggle,
) -> Result<(), Error> {
    let enabled = state == Toggle::On;
    update_config(ctx, move |config| config.automod.bypass_staff = enabled).await?;
    ctx.say(format!("Staff bypass {}.", on_off(enabled))).await?;
    Ok(())
}

fn status_report(config: &GuildModerationConfig) -> String {
    let automod = &config.automod;
    let spam = config.policy(ViolationCategory::SpamMessage);
    let mod_role = automod
        .mod_role
        .map_or_else(|| "not set".to_string(), |id| format!("<@&{id}>"));

    [
        format!("Auto-mod is **{}**", on_off(automod.enabled)),
        format!(
            "Word filter: {} ({} words)",
            on_off(automod.words.enabled),
            automod.words.list.len()
        ),
        format!(
            "Repeat filter: {}, {} repeats",
            on_off(automod.repeat.enabled),
            automod.repeat.min_repeats
        ),
        format!(
            "Spam: {}, {} messages, {} {}, purge up to {}",
            on_off(spam.enabled),
            spam.threshold,
            spam.action,
            format_seconds(spam.effective_timeout()),
            automod.spam_delete_max
        ),
        format!("Staff bypass: {}", on_off(automod.bypass_staff)),
        format!("Moderator role: {mod_role}"),
    ]
    .join("\n")
}
