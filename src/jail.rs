//! Jail: strip a member's roles and confine them to one channel
//!
//! The saved roles live in the guild configuration so a release after a
//! restart still gives them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const JAIL_ROLE_NAME: &str = "Jailed";
pub const JAIL_CHANNEL_NAME: &str = "jail";
/// Dark red
pub const JAIL_ROLE_COLOUR: u32 = 0x0099_2D22;

/// A jailed member and what to give back on release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailRecord {
    pub roles: Vec<u64>,
    pub reason: String,
    pub jailed_by: u64,
    pub jailed_at: DateTime<Utc>,
}

/// Jail settings for one guild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub role_id: Option<u64>,
    #[serde(default)]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub jailed: BTreeMap<u64, JailRecord>,
}

/// Why a member cannot be jailed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JailRefusal {
    #[error("The jail is not set up. Use `jail setup` first.")]
    NotSetUp,
    #[error("You cannot jail a bot.")]
    Bot,
    #[error("You cannot jail the server owner or an administrator.")]
    Administrator,
    #[error("I cannot jail someone whose top role is at or above mine.")]
    Hierarchy,
    #[error("That member is already jailed.")]
    AlreadyJailed,
}

/// What the guild knows about the member to jail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JailTarget {
    pub user_id: u64,
    pub is_bot: bool,
    pub is_owner: bool,
    pub is_admin: bool,
    pub top_position: u16,
    pub bot_top_position: u16,
}

impl JailSettings {
    /// Jail role and channel once `jail setup` has run
    #[must_use]
    pub fn cell(&self) -> Option<(u64, u64)> {
        match (self.enabled, self.role_id, self.channel_id) {
            (true, Some(role), Some(channel)) => Some((role, channel)),
            _ => None,
        }
    }

    /// # Errors
    /// The first reason `target` cannot be jailed
    pub fn check(&self, target: &JailTarget) -> Result<(), JailRefusal> {
        if self.cell().is_none() {
            return Err(JailRefusal::NotSetUp);
        }
        if target.is_bot {
            return Err(JailRefusal::Bot);
        }
        if target.is_owner || target.is_admin {
            return Err(JailRefusal::Administrator);
        }
        if target.top_position >= target.bot_top_position {
            return Err(JailRefusal::Hierarchy);
        }
        if self.jailed.contains_key(&target.user_id) {
            return Err(JailRefusal::AlreadyJailed);
        }
        Ok(())
    }

    /// Roles to hand back that still exist, never the jail role itself
    #[must_use]
    pub fn restorable_roles(&self, record: &JailRecord, exists: impl Fn(u64) -> bool) -> Vec<u64> {
        record
            .roles
            .iter()
            .copied()
            .filter(|&role| Some(role) != self.role_id && exists(role))
            .collect()
    }
}
