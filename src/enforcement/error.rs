//! Error types for enforcement
//!
//! Failures here are logged by the moderation pipeline and never reach the event handler.

use thiserror::Error;

/// Errors that can occur while punishing or remediating
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<poise::serenity_prelude::Error>),

    /// Failed to get guild or member
    #[error("Failed to get guild or member: {0}")]
    GuildOrMemberNotFound(String),

    /// Target sits at or above the bot in the role hierarchy
    #[error("Member {user_id} is not below the bot's top role in guild {guild_id}")]
    Hierarchy { guild_id: u64, user_id: u64 },

    /// Action validation failed
    #[error("Action validation failed: {0}")]
    ValidationFailed(String),
}

impl From<poise::serenity_prelude::Error> for EnforcementError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

/// Result type for enforcement operations
pub type EnforcementResult<T> = Result<T, EnforcementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EnforcementError::Hierarchy {
            guild_id: 1,
            user_id: 2,
        };
        assert_eq!(
            error.to_string(),
            "Member 2 is not below the bot's top role in guild 1"
        );

        let error = EnforcementError::GuildOrMemberNotFound("guild 5".to_string());
        assert_eq!(error.to_string(), "Failed to get guild or member: guild 5");

        let error = EnforcementError::ValidationFailed("empty".to_string());
        assert_eq!(error.to_string(), "Action validation failed: empty");
    }
}
