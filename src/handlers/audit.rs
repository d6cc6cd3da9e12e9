//! Audit-log classification
//!
//! Maps gateway audit entries to violation categories and picks the
//! remediation that undoes the executor's change.

use crate::enforcement::Remediation;
use crate::moderation::ViolationCategory;
use serenity::all::{GuildChannel, Role};
use serenity::model::guild::audit_log::{
    Action, Change, ChannelAction, MemberAction, RoleAction, WebhookAction,
};

/// Category for an audit action, if it is monitored
#[must_use]
pub fn category_for(action: &Action, changes: &[Change]) -> Option<ViolationCategory> {
    let category = match action {
        Action::Channel(ChannelAction::Create) => ViolationCategory::ChannelCreate,
        Action::Channel(ChannelAction::Delete) => ViolationCategory::ChannelDelete,
        Action::Role(RoleAction::Create) => ViolationCategory::RoleCreate,
        Action::Role(RoleAction::Delete) => ViolationCategory::RoleDelete,
        Action::Webhook(WebhookAction::Create) => ViolationCategory::WebhookCreate,
        Action::Webhook(WebhookAction::Delete) => ViolationCategory::WebhookDelete,
        Action::Member(MemberAction::Kick) => ViolationCategory::MassKick,
        Action::Member(MemberAction::BanAdd) => ViolationCategory::MassBan,
        Action::Member(MemberAction::BotAdd) => ViolationCategory::BotAdd,
        Action::Member(MemberAction::RoleUpdate) if roles_added(changes) => {
            ViolationCategory::RoleGive
        }
        _ => return None,
    };
    Some(category)
}

fn roles_added(changes: &[Change]) -> bool {
    changes
        .iter()
        .any(|c| matches!(c, Change::RolesAdded { new: Some(roles), .. } if !roles.is_empty()))
}

/// Remediation for a fired category
///
/// Deletions of channels and roles can only be undone from a snapshot captured
/// by the matching delete event; webhooks are recreated from the entry itself.
#[must_use]
pub fn remediation_for(
    category: ViolationCategory,
    target_id: Option<u64>,
    changes: &[Change],
    snapshot: Option<Remediation>,
) -> Option<Remediation> {
    match category {
        ViolationCategory::ChannelCreate => target_id.map(Remediation::DeleteChannel),
        ViolationCategory::RoleCreate => target_id.map(Remediation::DeleteRole),
        ViolationCategory::WebhookCreate => target_id.map(Remediation::DeleteWebhook),
        ViolationCategory::BotAdd => target_id.map(Remediation::KickMember),
        ViolationCategory::ChannelDelete | ViolationCategory::RoleDelete => snapshot,
        ViolationCategory::WebhookDelete => deleted_webhook(changes),
        _ => None,
    }
}

fn deleted_webhook(changes: &[Change]) -> Option<Remediation> {
    let mut name = None;
    let mut channel = None;
    for change in changes {
        match change {
            Change::Name { old: Some(old), .. } => name = Some(old.clone()),
            Change::ChannelId { old: Some(old), .. } => channel = Some(old.get()),
            _ => {}
        }
    }
    Some(Remediation::RestoreWebhook {
        channel: channel?,
        name: name?,
    })
}

/// Snapshot enough of a deleted channel to recreate it
#[must_use]
pub fn channel_snapshot(channel: &GuildChannel) -> Remediation {
    Remediation::RestoreChannel {
        name: channel.name.clone(),
        kind: channel.kind,
        parent: channel.parent_id.map(|id| id.get()),
    }
}

/// Snapshot enough of a deleted role to recreate it
#[must_use]
pub fn role_snapshot(role: &Role) -> Remediation {
    Remediation::RestoreRole {
        name: role.name.clone(),
        colour: role.colour.0,
        hoist: role.hoist,
        mentionable: role.mentionable,
    }
}
