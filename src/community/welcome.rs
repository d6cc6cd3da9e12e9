//! Join greetings

use poise::serenity_prelude::{CreateActionRow, CreateButton};
use serde::{Deserialize, Serialize};

/// Link buttons a greeting may carry
pub const MAX_BUTTONS: usize = 5;
/// Discord's button label limit
const MAX_LABEL: usize = 80;

pub const DEFAULT_MESSAGE: &str = "{user.mention} welcome to {guild.name}!";
pub const DEFAULT_TITLE: &str = "Welcome!";
pub const DEFAULT_DESCRIPTION: &str = "Glad to have you here, {user.mention}!";

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

/// A link button under the greeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub channel_id: Option<u64>,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    /// Slots 1 to `MAX_BUTTONS`, empty slots skipped
    #[serde(default)]
    pub buttons: Vec<Option<LinkButton>>,
}

impl Default for WelcomeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_id: None,
            message: default_message(),
            title: default_title(),
            description: default_description(),
            buttons: Vec::new(),
        }
    }
}

/// Values substituted into greeting templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeted<'a> {
    pub user_id: u64,
    pub user_name: &'a str,
    pub guild_name: &'a str,
    pub member_count: u64,
}

/// Fill `{user.mention}`, `{user.name}`, `{guild.name}` and `{member_count}`
#[must_use]
pub fn render(template: &str, greeted: &Greeted<'_>) -> String {
    template
        .replace("{user.mention}", &format!("<@{}>", greeted.user_id))
        .replace("{user.name}", greeted.user_name)
        .replace("{guild.name}", greeted.guild_name)
        .replace("{member_count}", &greeted.member_count.to_string())
}

/// `on`, `yes`, `true`, `enable(d)`, `1`
#[must_use]
pub fn parse_state(state: &str) -> bool {
    matches!(
        state.to_lowercase().as_str(),
        "on" | "true" | "enable" | "enabled" | "yes" | "y" | "1"
    )
}

impl WelcomeSettings {
    /// Channel and text to greet `greeted` with, when greetings are on
    #[must_use]
    pub fn greeting(&self, greeted: &Greeted<'_>) -> Option<(u64, String)> {
        let channel = self.channel_id.filter(|_| self.enabled)?;
        Some((channel, self.text(greeted)))
    }

    /// Message, title and description rendered for `greeted`, blank parts skipped
    #[must_use]
    pub fn text(&self, greeted: &Greeted<'_>) -> String {
        let mut parts = Vec::new();
        if !self.message.trim().is_empty() {
            parts.push(render(&self.message, greeted));
        }
        if !self.title.trim().is_empty() {
            parts.push(format!("**{}**", render(&self.title, greeted)));
        }
        if !self.description.trim().is_empty() {
            parts.push(render(&self.description, greeted));
        }
        parts.join("\n")
    }

    /// Put `button` in `slot` (1-based); `None` clears it
    ///
    /// # Errors
    /// Returns the accepted range when `slot` is out of it
    pub fn set_button(&mut self, slot: usize, button: Option<LinkButton>) -> Result<(), String> {
        if !(1..=MAX_BUTTONS).contains(&slot) {
            return Err(format!("Button slot must be between 1 and {MAX_BUTTONS}."));
        }
        if self.buttons.len() < slot {
            self.buttons.resize(slot, None);
        }
        self.buttons[slot - 1] = button;
        while self.buttons.last().is_some_and(Option::is_none) {
            self.buttons.pop();
        }
        Ok(())
    }

    /// Link buttons in slot order
    #[must_use]
    pub fn components(&self) -> Vec<CreateActionRow> {
        let buttons: Vec<CreateButton> = self
            .buttons
            .iter()
            .flatten()
            .map(|b| CreateButton::new_link(b.url.as_str()).label(truncate_label(&b.label)))
            .collect();
        if buttons.is_empty() {
            Vec::new()
        } else {
            vec![CreateActionRow::Buttons(buttons)]
        }
    }
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(MAX_LABEL - 3).collect();
        short.push_str("...");
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Greeted<'static> {
        Greeted {
            user_id: 7,
            user_name: "alice",
            guild_name: "Rustaceans",
            member_count: 42,
        }
    }

    #[test]
    fn test_render_placeholders() {
        assert_eq!(
            render("{user.mention} ({user.name}) is #{member_count} in {guild.name}", &alice()),
            "<@7> (alice) is #42 in Rustaceans"
        );
        assert_eq!(render("no placeholders", &alice()), "no placeholders");
    }

    #[test]
    fn test_greeting_needs_channel_and_switch() {
        let mut settings = WelcomeSettings::default();
        assert_eq!(settings.greeting(&alice()), None);

        settings.channel_id = Some(5);
        assert_eq!(settings.greeting(&alice()), None);

        settings.enabled = true;
        let (channel, text) = settings.greeting(&alice()).unwrap();
        assert_eq!(channel, 5);
        assert_eq!(
            text,
            "<@7> welcome to Rustaceans!\n**Welcome!**\nGlad to have you here, <@7>!"
        );
    }

    #[test]
    fn test_blank_parts_skipped() {
        let settings = WelcomeSettings {
            title: " ".to_string(),
            description: String::new(),
            ..WelcomeSettings::default()
        };
        assert_eq!(settings.text(&alice()), "<@7> welcome to Rustaceans!");
    }

    #[test]
    fn test_button_slots() {
        let mut settings = WelcomeSettings::default();
        let rules = LinkButton {
            label: "Rules".to_string(),
            url: "https://example.com/rules".to_string(),
        };
        settings.set_button(3, Some(rules.clone())).unwrap();
        assert_eq!(settings.buttons, vec![None, None, Some(rules)]);
        assert_eq!(settings.components().len(), 1);

        settings.set_button(3, None).unwrap();
        assert!(settings.buttons.is_empty());
        assert!(settings.components().is_empty());

        assert!(settings.set_button(0, None).is_err());
        assert!(settings.set_button(6, None).is_err());
    }

    #[test]
    fn test_parse_state() {
        assert!(parse_state("ON"));
        assert!(parse_state("enabled"));
        assert!(!parse_state("off"));
        assert!(!parse_state("maybe"));
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short"), "short");
        let long = truncate_label(&"x".repeat(100));
        assert_eq!(long.chars().count(), MAX_LABEL);
        assert!(long.ends_with("..."));
    }
}
