//! Category policies and the policy evaluator

use super::ViolationCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeout applied when a policy asks for a timeout without a usable duration
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Punishment applied to an offending actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentAction {
    Kick,
    Ban,
    Timeout,
    #[serde(alias = "strip")]
    StripRoles,
}

impl PunishmentAction {
    /// Parse the keyword used by the config commands
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "kick" => Some(Self::Kick),
            "ban" => Some(Self::Ban),
            "timeout" => Some(Self::Timeout),
            "strip" => Some(Self::StripRoles),
            _ => None,
        }
    }
}

impl fmt::Display for PunishmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kick => write!(f, "kick"),
            Self::Ban => write!(f, "ban"),
            Self::Timeout => write!(f, "timeout"),
            Self::StripRoles => write!(f, "strip"),
        }
    }
}

/// Configured response to one violation category in one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    pub enabled: bool,
    pub threshold: u32,
    pub action: PunishmentAction,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl CategoryPolicy {
    #[must_use]
    pub fn new(enabled: bool, threshold: u32, action: PunishmentAction, timeout_seconds: u64) -> Self {
        Self {
            enabled,
            threshold: threshold.max(1),
            action,
            timeout_seconds,
        }
    }

    /// Out-of-the-box policy for a category
    #[must_use]
    pub fn default_for(category: ViolationCategory) -> Self {
        use PunishmentAction::{Kick, Timeout};
        use ViolationCategory as C;

        match category {
            C::MassMention => Self::new(true, 2, Kick, DEFAULT_TIMEOUT_SECONDS),
            C::LinkPost => Self::new(true, 1, Timeout, 120),
            C::SpamMessage => Self::new(false, 5, Timeout, DEFAULT_TIMEOUT_SECONDS),
            C::RepeatedToken => Self::new(false, 1, Timeout, DEFAULT_TIMEOUT_SECONDS),
            _ => Self::new(true, 1, Kick, DEFAULT_TIMEOUT_SECONDS),
        }
    }

    /// The same policy with its threshold no higher than `capacity`
    ///
    /// A window never counts past its capacity, so a larger threshold could not fire.
    #[must_use]
    pub fn capped_at(mut self, capacity: usize) -> Self {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX).max(1);
        self.threshold = self.threshold.min(capacity);
        self
    }

    /// Timeout a decision under this policy would apply
    #[must_use]
    pub fn effective_timeout(&self) -> u64 {
        EnforcementDecision {
            action: self.action,
            timeout_seconds: self.timeout_seconds,
        }
        .effective_timeout()
    }
}

/// What the enforcer should do about an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcementDecision {
    pub action: PunishmentAction,
    pub timeout_seconds: u64,
}

impl EnforcementDecision {
    /// Timeout duration to apply, falling back to the default for zero
    #[must_use]
    pub fn effective_timeout(&self) -> u64 {
        if self.timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECONDS
        } else {
            self.timeout_seconds
        }
    }
}

/// Decide whether `count` violations under `policy` warrant enforcement
#[must_use]
pub fn evaluate(policy: &CategoryPolicy, count: usize) -> Option<EnforcementDecision> {
    let threshold = usize::try_from(policy.threshold.max(1)).unwrap_or(usize::MAX);
    if !policy.enabled || count < threshold {
        return None;
    }

    Some(EnforcementDecision {
        action: policy.action,
        timeout_seconds: policy.timeout_seconds,
    })
}
