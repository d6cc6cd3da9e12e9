//! Ticket panel settings and channel naming

use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Ticket Help";
pub const DEFAULT_DESCRIPTION: &str = "Press the button below to open a private ticket with staff.";
pub const DEFAULT_BUTTON_LABEL: &str = "Create Ticket";
/// Category created by `ticket set` when none is given
pub const CATEGORY_NAME: &str = "Tickets";
/// Panel channel created by `ticket set` when none is given
pub const PANEL_CHANNEL_NAME: &str = "ticket-panel";

const NAME_MARKER: &str = "-ticket-";
const MAX_SLUG_LEN: usize = 32;

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_button_label() -> String {
    DEFAULT_BUTTON_LABEL.to_string()
}

/// Ticket system settings for one guild, stored with the guild configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSettings {
    /// Set by `ticket set`; every other ticket setting requires it
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub panel_channel_id: Option<u64>,
    #[serde(default)]
    pub panel_message_id: Option<u64>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_button_label")]
    pub button_label: String,
    /// Role pinged on new tickets and allowed to claim, close and delete them
    #[serde(default)]
    pub mod_role: Option<u64>,
    #[serde(default)]
    pub log_channel_id: Option<u64>,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self {
            configured: false,
            category_id: None,
            panel_channel_id: None,
            panel_message_id: None,
            title: default_title(),
            description: default_description(),
            button_label: default_button_label(),
            mod_role: None,
            log_channel_id: None,
        }
    }
}

impl TicketSettings {
    /// Fresh settings for a panel in `panel_channel_id` under `category_id`
    #[must_use]
    pub fn configure(category_id: u64, panel_channel_id: u64) -> Self {
        Self {
            configured: true,
            category_id: Some(category_id),
            panel_channel_id: Some(panel_channel_id),
            ..Self::default()
        }
    }

    /// Panel message text
    #[must_use]
    pub fn panel_text(&self) -> String {
        format!("**{}**\n{}", self.title, self.description)
    }
}

/// Lowercase ASCII slug of a username, `"user"` when nothing usable remains
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "user".to_string()
    } else {
        slug.to_string()
    }
}

/// Channel name for a ticket opened by `user_id`
#[must_use]
pub fn channel_name(username: &str, user_id: u64) -> String {
    format!("{}{NAME_MARKER}{user_id}", slugify(username))
}

/// User who opened the ticket channel `name`, if it is one
#[must_use]
pub fn ticket_opener(name: &str) -> Option<u64> {
    let (_, id) = name.rsplit_once(NAME_MARKER)?;
    id.parse().ok().filter(|&id| id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Alice"), "alice");
        assert_eq!(slugify("mr. Bean__42"), "mr-bean-42");
        assert_eq!(slugify("--x--"), "x");
        assert_eq!(slugify("日本"), "user");
        assert_eq!(slugify(&"a".repeat(50)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_channel_name_round_trips_opener() {
        let name = channel_name("Alice Smith", 4242);
        assert_eq!(name, "alice-smith-ticket-4242");
        assert_eq!(ticket_opener(&name), Some(4242));
    }

    #[test]
    fn test_non_ticket_channels() {
        assert_eq!(ticket_opener("general"), None);
        assert_eq!(ticket_opener(PANEL_CHANNEL_NAME), None);
        assert_eq!(ticket_opener("ticket-logs"), None);
        assert_eq!(ticket_opener("bob-ticket-abc"), None);
        assert_eq!(ticket_opener("bob-ticket-0"), None);
    }

    #[test]
    fn test_settings_defaults_from_empty_yaml() {
        let settings: TicketSettings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, TicketSettings::default());
        assert!(!settings.configured);
        assert_eq!(settings.button_label, DEFAULT_BUTTON_LABEL);
    }

    #[test]
    fn test_configure() {
        let settings = TicketSettings::configure(1, 2);
        assert!(settings.configured);
        assert_eq!(settings.category_id, Some(1));
        assert_eq!(settings.panel_channel_id, Some(2));
        assert_eq!(settings.panel_message_id, None);
        assert_eq!(settings.panel_text(), format!("**{DEFAULT_TITLE}**\n{DEFAULT_DESCRIPTION}"));
    }
}
