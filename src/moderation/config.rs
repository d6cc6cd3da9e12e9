//! Per-guild moderation configuration
//!
//! `GuildModerationConfig` is the aggregate root persisted by the config store.
//! It is read as an immutable snapshot on every event and only changed through
//! explicit store updates issued by admin commands. Ticket, jail and community
//! settings ride along in the same document.

use super::{CategoryFamily, CategoryPolicy, PunishmentAction, ViolationCategory};
use crate::community::{BoosterSettings, ReactionRoles, VanitySettings, WelcomeSettings};
use crate::duration::find_duration;
use crate::jail::JailSettings;
use crate::ticket::TicketSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Schema version written by this build
pub const CONFIG_VERSION: u32 = 1;

fn current_version() -> u32 {
    CONFIG_VERSION
}

fn default_true() -> bool {
    true
}

/// Blacklisted-word filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFilter {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub list: Vec<String>,
}

/// Per-message repeated-token filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatFilter {
    #[serde(default)]
    pub enabled: bool,
    /// How many times one token may appear before the message is removed
    #[serde(default = "default_min_repeats")]
    pub min_repeats: u32,
}

fn default_min_repeats() -> u32 {
    5
}

impl Default for RepeatFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            min_repeats: default_min_repeats(),
        }
    }
}

/// Message filter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoModSettings {
    /// Master switch for the auto-mod family
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub words: WordFilter,
    #[serde(default)]
    pub repeat: RepeatFilter,
    /// Upper bound on messages removed after a spam burst
    #[serde(default = "default_spam_delete_max")]
    pub spam_delete_max: u32,
    /// Let owners and message managers bypass the filters
    #[serde(default = "default_true")]
    pub bypass_staff: bool,
    #[serde(default)]
    pub mod_role: Option<u64>,
}

fn default_spam_delete_max() -> u32 {
    50
}

impl Default for AutoModSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            words: WordFilter::default(),
            repeat: RepeatFilter::default(),
            spam_delete_max: default_spam_delete_max(),
            bypass_staff: true,
            mod_role: None,
        }
    }
}

/// Moderation settings for one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildModerationConfig {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Anti-nuke master switch
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub whitelist: BTreeSet<u64>,
    /// Users trusted like the owner (the "second owner")
    #[serde(default)]
    pub bypass_admins: BTreeSet<u64>,
    #[serde(default)]
    pub moderator_role: Option<u64>,
    #[serde(default)]
    pub category_moderator_roles: BTreeMap<ViolationCategory, u64>,
    #[serde(default)]
    pub categories: BTreeMap<ViolationCategory, CategoryPolicy>,
    #[serde(default)]
    pub automod: AutoModSettings,
    #[serde(default)]
    pub log_channel_id: Option<u64>,
    #[serde(default)]
    pub tickets: TicketSettings,
    #[serde(default)]
    pub jail: JailSettings,
    #[serde(default)]
    pub welcome: WelcomeSettings,
    #[serde(default)]
    pub vanity: VanitySettings,
    #[serde(default)]
    pub booster: BoosterSettings,
    /// Keyed by message id
    #[serde(default)]
    pub reaction_roles: ReactionRoles,
}

impl Default for GuildModerationConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            enabled: false,
            whitelist: BTreeSet::new(),
            bypass_admins: BTreeSet::new(),
            moderator_role: None,
            category_moderator_roles: BTreeMap::new(),
            categories: BTreeMap::new(),
            automod: AutoModSettings::default(),
            log_channel_id: None,
            tickets: TicketSettings::default(),
            jail: JailSettings::default(),
            welcome: WelcomeSettings::default(),
            vanity: VanitySettings::default(),
            booster: BoosterSettings::default(),
            reaction_roles: ReactionRoles::new(),
        }
    }
}

/// Why an actor's events are never counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    BotOwner,
    GuildOwner,
    BypassAdmin,
    SelfBot,
    Whitelisted,
    CategoryModerator,
    GeneralModerator,
    AutoModModerator,
    Staff,
}

impl fmt::Display for Exemption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::BotOwner => "bot owner",
            Self::GuildOwner => "guild owner",
            Self::BypassAdmin => "bypass admin",
            Self::SelfBot => "this bot",
            Self::Whitelisted => "whitelisted",
            Self::CategoryModerator => "category moderator",
            Self::GeneralModerator => "anti-nuke moderator",
            Self::AutoModModerator => "auto-mod moderator",
            Self::Staff => "staff",
        };
        f.write_str(reason)
    }
}

/// The acting user as seen by the event handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorProfile {
    pub actor_id: u64,
    pub role_ids: Vec<u64>,
    /// Holds administrator or manage-messages
    pub is_staff: bool,
}

impl ActorProfile {
    #[must_use]
    pub fn new(actor_id: u64) -> Self {
        Self {
            actor_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_roles(mut self, role_ids: impl IntoIterator<Item = u64>) -> Self {
        self.role_ids = role_ids.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }

    fn has_role(&self, role_id: u64) -> bool {
        self.role_ids.contains(&role_id)
    }
}

/// Identities that are trusted in the guild regardless of configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFacts {
    pub scope_id: u64,
    pub owner_id: Option<u64>,
    pub bot_user_id: u64,
    pub bot_owner_ids: Vec<u64>,
}

impl GuildModerationConfig {
    /// Policy for a category, falling back to the category default
    #[must_use]
    pub fn policy(&self, category: ViolationCategory) -> CategoryPolicy {
        self.categories
            .get(&category)
            .cloned()
            .unwrap_or_else(|| CategoryPolicy::default_for(category))
    }

    /// Mutable policy for a category, materialising the default if absent
    pub fn policy_mut(&mut self, category: ViolationCategory) -> &mut CategoryPolicy {
        self.categories
            .entry(category)
            .or_insert_with(|| CategoryPolicy::default_for(category))
    }

    /// Reset every category to its default policy
    pub fn seed_defaults(&mut self) {
        self.categories = ViolationCategory::ALL
            .into_iter()
            .map(|c| (c, CategoryPolicy::default_for(c)))
            .collect();
    }

    #[must_use]
    pub fn family_enabled(&self, family: CategoryFamily) -> bool {
        match family {
            CategoryFamily::AntiNuke => self.enabled,
            CategoryFamily::AutoMod => self.automod.enabled,
        }
    }

    /// Master switch and category policy both on
    #[must_use]
    pub fn is_active(&self, category: ViolationCategory) -> bool {
        self.family_enabled(category.family()) && self.policy(category).enabled
    }

    /// First reason `actor` is exempt from `category`, if any
    #[must_use]
    pub fn exemption(
        &self,
        actor: &ActorProfile,
        facts: &ScopeFacts,
        category: ViolationCategory,
    ) -> Option<Exemption> {
        let id = actor.actor_id;

        if facts.bot_owner_ids.contains(&id) {
            return Some(Exemption::BotOwner);
        }
        if facts.owner_id == Some(id) {
            return Some(Exemption::GuildOwner);
        }
        if self.bypass_admins.contains(&id) {
            return Some(Exemption::BypassAdmin);
        }
        if facts.bot_user_id == id {
            return Some(Exemption::SelfBot);
        }
        if self.whitelist.contains(&id) {
            return Some(Exemption::Whitelisted);
        }
        if self
            .category_moderator_roles
            .get(&category)
            .is_some_and(|&role| actor.has_role(role))
        {
            return Some(Exemption::CategoryModerator);
        }

        match category.family() {
            CategoryFamily::AntiNuke => self
                .moderator_role
                .filter(|&role| actor.has_role(role))
                .map(|_| Exemption::GeneralModerator),
            CategoryFamily::AutoMod => {
                if self.automod.mod_role.is_some_and(|role| actor.has_role(role)) {
                    Some(Exemption::AutoModModerator)
                } else if self.automod.bypass_staff && actor.is_staff {
                    Some(Exemption::Staff)
                } else {
                    None
                }
            }
        }
    }
}

/// A parsed `antinuke config` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDirective {
    pub category: ViolationCategory,
    pub enabled: Option<bool>,
    pub threshold: Option<u32>,
    pub action: Option<PunishmentAction>,
    pub timeout_seconds: Option<u64>,
}

impl CategoryDirective {
    /// Lower the threshold to `capacity` when it exceeds it
    ///
    /// Returns whether the threshold was changed.
    pub fn cap_threshold(&mut self, capacity: usize) -> bool {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX).max(1);
        match self.threshold {
            Some(threshold) if threshold > capacity => {
                self.threshold = Some(capacity);
                true
            }
            _ => false,
        }
    }

    /// Apply the directive to `config`
    pub fn apply(&self, config: &mut GuildModerationConfig) {
        let policy = config.policy_mut(self.category);
        if let Some(enabled) = self.enabled {
            policy.enabled = enabled;
        }
        if let Some(threshold) = self.threshold {
            policy.threshold = threshold;
        }
        if let Some(action) = self.action {
            policy.action = action;
        }
        if let Some(timeout) = self.timeout_seconds {
            policy.timeout_seconds = timeout;
        }
    }
}

/// Errors from parsing a free-form directive
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("Provide a valid category name. Available categories: {0}")]
    UnknownCategory(String),
}

/// Parse `"<category alias> [enable|disable] [threshold] [ban|kick|strip|timeout [duration]]"`
///
/// # Errors
/// Returns an error if no category alias appears in the text
pub fn parse_directive(text: &str) -> Result<CategoryDirective, DirectiveError> {
    let raw = text.trim().to_lowercase();
    let category = ViolationCategory::find_in(&raw).ok_or_else(|| {
        let names: Vec<&str> = ViolationCategory::ALL.iter().map(|c| c.alias()).collect();
        DirectiveError::UnknownCategory(names.join(", "))
    })?;

    let tokens: Vec<&str> = raw.split_whitespace().collect();

    let enabled = if tokens.contains(&"disable") {
        Some(false)
    } else if tokens.contains(&"enable") {
        Some(true)
    } else {
        None
    };

    let threshold = tokens
        .iter()
        .find_map(|t| t.parse::<u32>().ok())
        .map(|n| n.clamp(1, 100));

    let action = tokens.iter().find_map(|t| PunishmentAction::from_keyword(t));

    let timeout_seconds = if action == Some(PunishmentAction::Timeout) {
        find_duration(&raw).map(|d| d.as_secs())
    } else {
        None
    };

    Ok(CategoryDirective {
        category,
        enabled,
        threshold,
        action,
        timeout_seconds,
    })
}
