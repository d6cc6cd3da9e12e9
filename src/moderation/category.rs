//! Violation categories
//!
//! The fixed set of monitored violation types and the family each one belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping of categories that share a master switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryFamily {
    /// Destructive administrative actions and raid-style message abuse
    AntiNuke,
    /// Message content filters
    AutoMod,
}

/// A classified type of monitored violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    MassMention,
    MassKick,
    MassBan,
    LinkPost,
    ChannelCreate,
    ChannelDelete,
    RoleGive,
    RoleCreate,
    RoleDelete,
    WebhookCreate,
    WebhookDelete,
    BotAdd,
    SpamMessage,
    RepeatedToken,
}

impl ViolationCategory {
    /// Every category, in display order
    pub const ALL: [Self; 14] = [
        Self::MassMention,
        Self::MassKick,
        Self::MassBan,
        Self::LinkPost,
        Self::ChannelCreate,
        Self::ChannelDelete,
        Self::RoleGive,
        Self::RoleCreate,
        Self::RoleDelete,
        Self::WebhookCreate,
        Self::WebhookDelete,
        Self::BotAdd,
        Self::SpamMessage,
        Self::RepeatedToken,
    ];

    #[must_use]
    pub fn family(self) -> CategoryFamily {
        match self {
            Self::SpamMessage | Self::RepeatedToken => CategoryFamily::AutoMod,
            _ => CategoryFamily::AntiNuke,
        }
    }

    /// Human alias accepted by the free-form config command
    #[must_use]
    pub fn alias(self) -> &'static str {
        match self {
            Self::MassMention => "mass mention",
            Self::MassKick => "mass kick",
            Self::MassBan => "mass ban",
            Self::LinkPost => "link",
            Self::ChannelCreate => "creating channel",
            Self::ChannelDelete => "deleting channel",
            Self::RoleGive => "giving role",
            Self::RoleCreate => "creating role",
            Self::RoleDelete => "deleting role",
            Self::WebhookCreate => "creating webhook",
            Self::WebhookDelete => "deleting webhook",
            Self::BotAdd => "bot add",
            Self::SpamMessage => "spam",
            Self::RepeatedToken => "repeat",
        }
    }

    /// Find the first category whose alias occurs in `text` (already lower-cased)
    #[must_use]
    pub fn find_in(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| text.contains(c.alias()))
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MassMention => "Mass Mention",
            Self::MassKick => "Mass Kick",
            Self::MassBan => "Mass Ban",
            Self::LinkPost => "Link Post",
            Self::ChannelCreate => "Channel Create",
            Self::ChannelDelete => "Channel Delete",
            Self::RoleGive => "Role Give",
            Self::RoleCreate => "Role Create",
            Self::RoleDelete => "Role Delete",
            Self::WebhookCreate => "Webhook Create",
            Self::WebhookDelete => "Webhook Delete",
            Self::BotAdd => "Bot Add",
            Self::SpamMessage => "Spam Message",
            Self::RepeatedToken => "Repeated Token",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family() {
        assert_eq!(ViolationCategory::MassBan.family(), CategoryFamily::AntiNuke);
        assert_eq!(ViolationCategory::LinkPost.family(), CategoryFamily::AntiNuke);
        assert_eq!(ViolationCategory::SpamMessage.family(), CategoryFamily::AutoMod);
        assert_eq!(ViolationCategory::RepeatedToken.family(), CategoryFamily::AutoMod);
    }

    #[test]
    fn test_find_in_text() {
        assert_eq!(
            ViolationCategory::find_in("mass mention enable 3 kick"),
            Some(ViolationCategory::MassMention)
        );
        assert_eq!(
            ViolationCategory::find_in("deleting channel ban"),
            Some(ViolationCategory::ChannelDelete)
        );
        assert_eq!(ViolationCategory::find_in("nothing here"), None);
    }

    #[test]
    fn test_serde_names() {
        let yaml = serde_yaml::to_string(&ViolationCategory::WebhookDelete).unwrap();
        assert_eq!(yaml.trim(), "webhook_delete");
        let back: ViolationCategory = serde_yaml::from_str("bot_add").unwrap();
        assert_eq!(back, ViolationCategory::BotAdd);
    }
}
