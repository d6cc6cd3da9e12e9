//! Best-effort repairs for the side effects of a violation

use super::{EnforcementError, EnforcementResult};
use poise::serenity_prelude::{
    ChannelId, ChannelType, CreateChannel, CreateWebhook, EditRole, GuildId, Http, MessageId,
    RoleId, UserId, WebhookId,
};
use tracing::info;

const REASON: &str = "Anti-nuke remediation";

/// What to undo after an enforcement fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    DeleteChannel(u64),
    RestoreChannel {
        name: String,
        kind: ChannelType,
        parent: Option<u64>,
    },
    DeleteRole(u64),
    RestoreRole {
        name: String,
        colour: u32,
        hoist: bool,
        mentionable: bool,
    },
    DeleteWebhook(u64),
    RestoreWebhook {
        channel: u64,
        name: String,
    },
    /// Remove a member, used for bots added by an offender
    KickMember(u64),
    DeleteMessages {
        channel: u64,
        messages: Vec<u64>,
    },
}

impl Remediation {
    /// Short label for logs and reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::DeleteChannel(id) => format!("delete channel {id}"),
            Self::RestoreChannel { name, .. } => format!("restore channel #{name}"),
            Self::DeleteRole(id) => format!("delete role {id}"),
            Self::RestoreRole { name, .. } => format!("restore role @{name}"),
            Self::DeleteWebhook(id) => format!("delete webhook {id}"),
            Self::RestoreWebhook { name, .. } => format!("restore webhook {name}"),
            Self::KickMember(id) => format!("kick member {id}"),
            Self::DeleteMessages { messages, .. } => format!("delete {} messages", messages.len()),
        }
    }

    /// Apply the repair through the Discord API
    pub async fn apply(&self, http: &Http, guild_id: GuildId) -> EnforcementResult<()> {
        info!("Remediation in guild {guild_id}: {}", self.describe());

        match self {
            Self::DeleteChannel(id) => {
                ChannelId::new(*id).delete(http).await?;
            }
            Self::RestoreChannel { name, kind, parent } => {
                let mut builder = CreateChannel::new(name.as_str())
                    .kind(*kind)
                    .audit_log_reason(REASON);
                if let Some(parent) = parent {
                    builder = builder.category(ChannelId::new(*parent));
                }
                guild_id.create_channel(http, builder).await?;
            }
            Self::DeleteRole(id) => {
                guild_id.delete_role(http, RoleId::new(*id)).await?;
            }
            Self::RestoreRole {
                name,
                colour,
                hoist,
                mentionable,
            } => {
                let builder = EditRole::new()
                    .name(name.as_str())
                    .colour(*colour)
                    .hoist(*hoist)
                    .mentionable(*mentionable)
                    .audit_log_reason(REASON);
                guild_id.create_role(http, builder).await?;
            }
            Self::DeleteWebhook(id) => {
                http.delete_webhook(WebhookId::new(*id), Some(REASON)).await?;
            }
            Self::RestoreWebhook { channel, name } => {
                ChannelId::new(*channel)
                    .create_webhook(http, CreateWebhook::new(name.as_str()).audit_log_reason(REASON))
                    .await?;
            }
            Self::KickMember(id) => {
                guild_id.kick_with_reason(http, UserId::new(*id), REASON).await?;
            }
            Self::DeleteMessages { channel, messages } => {
                let channel = ChannelId::new(*channel);
                let ids: Vec<MessageId> = messages.iter().copied().map(MessageId::new).collect();
                match ids.as_slice() {
                    [] => {
                        return Err(EnforcementError::ValidationFailed(
                            "No messages to delete".to_string(),
                        ));
                    }
                    [single] => channel.delete_message(http, *single).await?,
                    _ => {
                        // Bulk delete accepts 2..=100 ids per request
                        for chunk in ids.chunks(100) {
                            if let [single] = chunk {
                                channel.delete_message(http, *single).await?;
                            } else {
                                channel.delete_messages(http, chunk).await?;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(Remediation::DeleteChannel(5).describe(), "delete channel 5");
        assert_eq!(
            Remediation::RestoreRole {
                name: "mods".to_string(),
                colour: 0,
                hoist: false,
                mentionable: false,
            }
            .describe(),
            "restore role @mods"
        );
        assert_eq!(
            Remediation::DeleteMessages {
                channel: 1,
                messages: vec![1, 2, 3],
            }
            .describe(),
            "delete 3 messages"
        );
    }
}
