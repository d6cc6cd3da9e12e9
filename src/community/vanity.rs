//! Vanity status roles and booster announcements

use dashmap::DashMap;
use poise::serenity_prelude::{Activity, ActivityType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Quiet period between two vanity announcements for one member
pub const VANITY_DEBOUNCE: Duration = Duration::from_secs(30);
/// Quiet period between two boost announcements for one member
pub const BOOSTER_DEBOUNCE: Duration = Duration::from_secs(60);

/// Role for members whose custom status advertises the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VanitySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub role_id: Option<u64>,
    /// Text the custom status must contain, matched case-insensitively
    #[serde(default)]
    pub match_text: Option<String>,
    #[serde(default)]
    pub announce_channel_id: Option<u64>,
    #[serde(default)]
    pub announce_text: Option<String>,
}

/// Announcement when a member starts boosting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// What to do with the vanity role after a presence change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VanityChange {
    Grant { role_id: u64 },
    Revoke { role_id: u64 },
    Keep,
}

/// Custom status texts joined, lowercased
#[must_use]
pub fn custom_status(activities: &[Activity]) -> String {
    activities
        .iter()
        .filter(|a| a.kind == ActivityType::Custom)
        .filter_map(|a| a.state.as_deref())
        .collect::<Vec<_>>()
        .join(" \n")
        .to_lowercase()
}

/// Replace `{user.mention}` in an announcement
#[must_use]
pub fn announcement(template: &str, user_id: u64) -> String {
    template.replace("{user.mention}", &format!("<@{user_id}>"))
}

impl VanitySettings {
    /// Role change for a member whose status is now `status`
    #[must_use]
    pub fn change(&self, status: &str, has_role: bool) -> VanityChange {
        let (true, Some(role_id), Some(text)) = (self.enabled, self.role_id, self.match_text.as_deref())
        else {
            return VanityChange::Keep;
        };
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return VanityChange::Keep;
        }
        match (status.contains(&text), has_role) {
            (true, false) => VanityChange::Grant { role_id },
            (false, true) => VanityChange::Revoke { role_id },
            _ => VanityChange::Keep,
        }
    }

    /// Channel and text announcing `user_id`'s new vanity role
    #[must_use]
    pub fn announcement_for(&self, user_id: u64) -> Option<(u64, String)> {
        Some((
            self.announce_channel_id?,
            announcement(self.announce_text.as_deref()?, user_id),
        ))
    }
}

impl BoosterSettings {
    /// Channel and text for a member who just started boosting
    #[must_use]
    pub fn announcement_for(&self, user_id: u64) -> Option<(u64, String)> {
        if !self.enabled {
            return None;
        }
        Some((self.channel_id?, announcement(self.text.as_deref()?, user_id)))
    }
}

/// Per-key rate limit for announcements
#[derive(Debug, Clone, Default)]
pub struct Debounce {
    last: Arc<DashMap<(u64, u64), Instant>>,
}

impl Debounce {
    /// `true` if `key` has been quiet for `period`, recording this call
    pub fn ready(&self, key: (u64, u64), period: Duration) -> bool {
        let now = Instant::now();
        let mut ready = true;
        self.last
            .entry(key)
            .and_modify(|last| {
                if now.duration_since(*last) < period {
                    ready = false;
                } else {
                    *last = now;
                }
            })
            .or_insert(now);
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vanity() -> VanitySettings {
        VanitySettings {
            enabled: true,
            role_id: Some(9),
            match_text: Some("discord.gg/Rust".to_string()),
            announce_channel_id: Some(3),
            announce_text: Some("Thanks {user.mention}!".to_string()),
        }
    }

    #[test]
    fn test_grant_and_revoke() {
        let settings = vanity();
        assert_eq!(
            settings.change("join discord.gg/rust today", false),
            VanityChange::Grant { role_id: 9 }
        );
        assert_eq!(settings.change("join discord.gg/rust today", true), VanityChange::Keep);
        assert_eq!(settings.change("busy", true), VanityChange::Revoke { role_id: 9 });
        assert_eq!(settings.change("busy", false), VanityChange::Keep);
    }

    #[test]
    fn test_incomplete_settings_keep_roles() {
        let mut settings = vanity();
        settings.enabled = false;
        assert_eq!(settings.change("busy", true), VanityChange::Keep);

        let mut settings = vanity();
        settings.match_text = Some("  ".to_string());
        assert_eq!(settings.change("busy", true), VanityChange::Keep);
    }

    #[test]
    fn test_announcements() {
        assert_eq!(vanity().announcement_for(7), Some((3, "Thanks <@7>!".to_string())));

        let mut booster = BoosterSettings {
            enabled: true,
            channel_id: Some(4),
            text: Some("{user.mention} boosted!".to_string()),
        };
        assert_eq!(booster.announcement_for(7), Some((4, "<@7> boosted!".to_string())));
        booster.enabled = false;
        assert_eq!(booster.announcement_for(7), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce() {
        let debounce = Debounce::default();
        assert!(debounce.ready((1, 7), VANITY_DEBOUNCE));
        assert!(!debounce.ready((1, 7), VANITY_DEBOUNCE));
        assert!(debounce.ready((1, 8), VANITY_DEBOUNCE));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(debounce.ready((1, 7), VANITY_DEBOUNCE));
    }
}
