//! Roles granted by reacting to a message

use poise::serenity_prelude::ReactionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One message's reaction role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRole {
    pub role_id: u64,
    /// Unicode emoji, or the id of a custom emoji
    pub emoji: String,
    pub channel_id: u64,
}

/// Reaction roles keyed by message id
pub type ReactionRoles = BTreeMap<u64, ReactionRole>;

/// How a reaction emoji is stored: custom emoji by id, unicode as-is
#[must_use]
pub fn emoji_key(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Custom { id, .. } => id.get().to_string(),
        ReactionType::Unicode(text) => text.clone(),
        _ => String::new(),
    }
}

/// Role granted for reacting to `message_id` with `emoji`
#[must_use]
pub fn role_for(roles: &ReactionRoles, message_id: u64, emoji: &ReactionType) -> Option<u64> {
    let entry = roles.get(&message_id)?;
    (entry.emoji == emoji_key(emoji)).then_some(entry.role_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::EmojiId;

    fn roles() -> ReactionRoles {
        let mut roles = ReactionRoles::new();
        roles.insert(
            100,
            ReactionRole {
                role_id: 5,
                emoji: "✅".to_string(),
                channel_id: 1,
            },
        );
        roles.insert(
            200,
            ReactionRole {
                role_id: 6,
                emoji: "42".to_string(),
                channel_id: 1,
            },
        );
        roles
    }

    #[test]
    fn test_unicode_match() {
        let check = ReactionType::Unicode("✅".to_string());
        assert_eq!(role_for(&roles(), 100, &check), Some(5));
        assert_eq!(role_for(&roles(), 300, &check), None);
        assert_eq!(role_for(&roles(), 100, &ReactionType::Unicode("❌".to_string())), None);
    }

    #[test]
    fn test_custom_emoji_matches_by_id() {
        let custom = ReactionType::Custom {
            animated: false,
            id: EmojiId::new(42),
            name: Some("ferris".to_string()),
        };
        assert_eq!(emoji_key(&custom), "42");
        assert_eq!(role_for(&roles(), 200, &custom), Some(6));
    }
}
