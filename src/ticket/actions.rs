//! Ticket buttons and who may press them

use poise::serenity_prelude::{ButtonStyle, CreateActionRow, CreateButton};
use std::fmt;

/// Custom id of the panel button that opens a ticket
pub const CREATE_ID: &str = "ticket_create";

/// Buttons posted in every ticket channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    Delete,
    Claim,
    Close,
    Transcript,
}

impl TicketAction {
    pub const ALL: [Self; 4] = [Self::Delete, Self::Claim, Self::Close, Self::Transcript];

    #[must_use]
    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Delete => "ticket_delete",
            Self::Claim => "ticket_claim",
            Self::Close => "ticket_close",
            Self::Transcript => "ticket_transcript",
        }
    }

    #[must_use]
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.custom_id() == custom_id)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Delete => "Delete",
            Self::Claim => "Claim",
            Self::Close => "Close",
            Self::Transcript => "Transcript",
        }
    }

    fn style(self) -> ButtonStyle {
        match self {
            Self::Delete => ButtonStyle::Danger,
            Self::Claim => ButtonStyle::Success,
            Self::Close => ButtonStyle::Secondary,
            Self::Transcript => ButtonStyle::Primary,
        }
    }

    /// The member who opened the ticket may press this too
    #[must_use]
    pub fn open_to_opener(self) -> bool {
        matches!(self, Self::Close | Self::Transcript)
    }
}

/// Whoever pressed a ticket button, relative to that ticket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clicker {
    pub is_guild_owner: bool,
    pub is_bypass_admin: bool,
    pub has_mod_role: bool,
    pub is_opener: bool,
}

impl Clicker {
    /// Ticket moderators, bypass admins and the guild owner
    #[must_use]
    pub fn is_ticket_staff(&self) -> bool {
        self.is_guild_owner || self.is_bypass_admin || self.has_mod_role
    }

    #[must_use]
    pub fn may_use(&self, action: TicketAction) -> bool {
        self.is_ticket_staff() || (self.is_opener && action.open_to_opener())
    }
}

/// The panel's single create button
#[must_use]
pub fn panel_components(button_label: &str) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(CREATE_ID)
            .label(button_label)
            .style(ButtonStyle::Primary),
    ])]
}

/// Action row for a ticket; the claim button is disabled once claimed
#[must_use]
pub fn action_components(claimed: bool) -> Vec<CreateActionRow> {
    let buttons = TicketAction::ALL
        .into_iter()
        .map(|action| {
            CreateButton::new(action.custom_id())
                .label(action.label())
                .style(action.style())
                .disabled(claimed && action == TicketAction::Claim)
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

/// Lifecycle step written to the ticket log channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketEvent {
    Created,
    Claimed,
    Closed,
    Deleted,
    Transcript,
}

impl fmt::Display for TicketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Claimed => "claimed",
            Self::Closed => "closed",
            Self::Deleted => "deleted",
            Self::Transcript => "transcript requested",
        };
        f.write_str(name)
    }
}

/// One log channel line
#[must_use]
pub fn log_line(
    event: TicketEvent,
    channel_id: u64,
    opener_id: Option<u64>,
    actor_id: u64,
    claimed_by: Option<u64>,
) -> String {
    let mut line = format!("🎫 Ticket <#{channel_id}> {event} by <@{actor_id}>");
    if let Some(opener) = opener_id.filter(|&id| id != actor_id) {
        line.push_str(&format!(" (opened by <@{opener}>)"));
    }
    if let Some(claimer) = claimed_by.filter(|_| event != TicketEvent::Claimed) {
        line.push_str(&format!(", claimed by <@{claimer}>"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_ids_round_trip() {
        for action in TicketAction::ALL {
            assert_eq!(TicketAction::from_custom_id(action.custom_id()), Some(action));
        }
        assert_eq!(TicketAction::from_custom_id(CREATE_ID), None);
        assert_eq!(TicketAction::from_custom_id("view_limit_1"), None);
    }

    #[test]
    fn test_staff_may_press_everything() {
        let owner = Clicker {
            is_guild_owner: true,
            ..Clicker::default()
        };
        let moderator = Clicker {
            has_mod_role: true,
            ..Clicker::default()
        };
        for action in TicketAction::ALL {
            assert!(owner.may_use(action));
            assert!(moderator.may_use(action));
        }
    }

    #[test]
    fn test_opener_may_only_close_or_take_transcript() {
        let opener = Clicker {
            is_opener: true,
            ..Clicker::default()
        };
        assert!(opener.may_use(TicketAction::Close));
        assert!(opener.may_use(TicketAction::Transcript));
        assert!(!opener.may_use(TicketAction::Claim));
        assert!(!opener.may_use(TicketAction::Delete));

        let stranger = Clicker::default();
        assert!(TicketAction::ALL.into_iter().all(|a| !stranger.may_use(a)));
    }

    #[test]
    fn test_log_line() {
        assert_eq!(
            log_line(TicketEvent::Created, 5, Some(7), 7, None),
            "🎫 Ticket <#5> created by <@7>"
        );
        assert_eq!(
            log_line(TicketEvent::Claimed, 5, Some(7), 9, Some(9)),
            "🎫 Ticket <#5> claimed by <@9> (opened by <@7>)"
        );
        assert_eq!(
            log_line(TicketEvent::Closed, 5, Some(7), 7, Some(9)),
            "🎫 Ticket <#5> closed by <@7>, claimed by <@9>"
        );
    }
}
