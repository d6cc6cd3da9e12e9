use super::{can_configure, on_off, scope_id, update_config};
use crate::community::welcome::{Greeted, LinkButton, WelcomeSettings, parse_state};
use crate::{COMMAND_TARGET, Context, Error};
use poise::serenity_prelude::GuildChannel;
use std::fmt::Write as _;
use tracing::info;

/// Greet new members
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("set", "message", "title", "description", "button", "status", "preview", "reset"),
    subcommand_required
)]
pub async fn welcome(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn welcome_settings(ctx: Context<'_>) -> Result<WelcomeSettings, Error> {
    Ok(ctx
        .data()
        .store()
        .get_or_default(scope_id(ctx)?)
        .await?
        .welcome
        .clone())
}

/// Pick the greeting channel and switch greetings on or off
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Channel to greet in"]
    #[channel_types("Text")]
    channel: GuildChannel,
    #[description = "on or off (default on)"] state: Option<String>,
) -> Result<(), Error> {
    let enabled = state.as_deref().is_none_or(parse_state);
    let channel_id = channel.id.get();
    update_config(ctx, move |c| {
        c.welcome.channel_id = Some(channel_id);
        c.welcome.enabled = enabled;
    })
    .await?;
    info!(
        target: COMMAND_TARGET,
        "{} set welcome channel {channel_id} ({}) in guild {:?}",
        ctx.author().id,
        on_off(enabled),
        ctx.guild_id()
    );
    ctx.say(format!("Welcome messages {} in <#{channel_id}>.", on_off(enabled)))
        .await?;
    Ok(())
}

/// Plain text sent above the greeting
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn message(
    ctx: Context<'_>,
    #[description = "Supports {user.mention}, {user.name}, {guild.name}, {member_count}"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    update_config(ctx, move |c| c.welcome.message = text).await?;
    ctx.say("Welcome message updated.").await?;
    Ok(())
}

/// Bold heading of the greeting
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn title(
    ctx: Context<'_>,
    #[description = "Heading text"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    update_config(ctx, move |c| c.welcome.title = text).await?;
    ctx.say("Welcome title updated.").await?;
    Ok(())
}

/// Body of the greeting
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn description(
    ctx: Context<'_>,
    #[description = "Body text"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    update_config(ctx, move |c| c.welcome.description = text).await?;
    ctx.say("Welcome description updated.").await?;
    Ok(())
}

/// `off` clears the slot, otherwise both label and an http(s) url are needed
fn parse_button(label: &str, url: Option<&str>) -> Result<Option<LinkButton>, String> {
    if label.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let url = url.ok_or("Give a url for the button, or `off` to remove it.")?;
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err("Button urls must start with http:// or https://.".to_string());
    }
    Ok(Some(LinkButton {
        label: label.to_string(),
        url: url.to_string(),
    }))
}

/// Set or clear a link button under the greeting
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn button(
    ctx: Context<'_>,
    #[description = "Slot, 1 to 5"] slot: usize,
    #[description = "Button label, or off"] label: String,
    #[description = "Link the button opens"] url: Option<String>,
) -> Result<(), Error> {
    let button = match parse_button(&label, url.as_deref()) {
        Ok(button) => button,
        Err(reason) => {
            ctx.say(reason).await?;
            return Ok(());
        }
    };
    let mut settings = welcome_settings(ctx).await?;
    if let Err(reason) = settings.set_button(slot, button) {
        ctx.say(reason).await?;
        return Ok(());
    }
    let buttons = settings.buttons;
    update_config(ctx, move |c| c.welcome.buttons = buttons).await?;
    ctx.say(format!("Button {slot} updated.")).await?;
    Ok(())
}

fn status_text(settings: &WelcomeSettings) -> String {
    let mut text = String::from("**Welcome settings**\n");
    let _ = writeln!(text, "Status: {}", on_off(settings.enabled));
    let _ = writeln!(
        text,
        "Channel: {}",
        settings
            .channel_id
            .map_or_else(|| "Not set".to_string(), |id| format!("<#{id}>"))
    );
    let _ = writeln!(text, "Message: {}", settings.message);
    let _ = writeln!(text, "Title: {}", settings.title);
    let _ = write!(text, "Description: {}", settings.description);
    for (slot, button) in settings.buttons.iter().enumerate() {
        if let Some(button) = button {
            let _ = write!(text, "\nButton {}: {} ({})", slot + 1, button.label, button.url);
        }
    }
    text
}

/// Show the greeting settings
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let settings = welcome_settings(ctx).await?;
    ctx.say(status_text(&settings)).await?;
    Ok(())
}

/// Show the greeting as it would look for you
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn preview(ctx: Context<'_>) -> Result<(), Error> {
    let settings = welcome_settings(ctx).await?;
    let (guild_name, member_count) = ctx
        .guild()
        .map(|g| (g.name.clone(), g.member_count))
        .unwrap_or_default();
    let author = ctx.author();
    let greeted = Greeted {
        user_id: author.id.get(),
        user_name: &author.name,
        guild_name: &guild_name,
        member_count,
    };
    ctx.send(
        poise::CreateReply::default()
            .content(settings.text(&greeted))
            .components(settings.components()),
    )
    .await?;
    Ok(())
}

/// Turn greetings off and restore the default texts
#[poise::command(prefix_command, slash_command, guild_only, check = "can_configure")]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    update_config(ctx, |c| c.welcome = WelcomeSettings::default()).await?;
    ctx.say("Welcome settings reset.").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommands() {
        let command = welcome();
        let names: Vec<&str> = command.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["set", "message", "title", "description", "button", "status", "preview", "reset"]
        );
    }

    #[test]
    fn test_changes_need_configure_rights() {
        for command in welcome().subcommands {
            let read_only = matches!(command.name.as_str(), "status" | "preview");
            assert_eq!(command.checks.is_empty(), read_only, "{}", command.name);
        }
    }

    #[test]
    fn test_parse_button() {
        assert_eq!(parse_button("OFF", None), Ok(None));
        assert!(parse_button("Rules", None).is_err());
        assert!(parse_button("Rules", Some("ftp://example.com")).is_err());
        assert_eq!(
            parse_button("Rules", Some("https://example.com")),
            Ok(Some(LinkButton {
                label: "Rules".to_string(),
                url: "https://example.com".to_string(),
            }))
        );
    }

    #[test]
    fn test_status_lists_buttons() {
        let mut settings = WelcomeSettings::default();
        settings.channel_id = Some(3);
        settings
            .set_button(
                2,
                Some(LinkButton {
                    label: "Site".to_string(),
                    url: "https://example.com".to_string(),
                }),
            )
            .unwrap();
        let text = status_text(&settings);
        assert!(text.contains("Channel: <#3>"));
        assert!(text.ends_with("Button 2: Site (https://example.com)"));
    }
}
