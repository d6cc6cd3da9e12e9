//! Violation tracking, policy evaluation and the moderation pipeline

mod category;
pub mod config;
pub mod detect;
mod policy;
mod service;
pub mod tracker;

pub use category::{CategoryFamily, ViolationCategory};
pub use config::{
    ActorProfile, AutoModSettings, CONFIG_VERSION, CategoryDirective, Exemption,
    GuildModerationConfig, ScopeFacts, parse_directive,
};
pub use policy::{
    CategoryPolicy, DEFAULT_TIMEOUT_SECONDS, EnforcementDecision, PunishmentAction, evaluate,
};
pub use service::{ModerationService, Outcome, ViolationEvent};
pub use tracker::{TrackerError, TrackerSettings, ViolationKey, ViolationTracker, WindowSpec};
