//! Community features: join greetings, vanity and booster recognition, and
//! reaction roles
//!
//! Settings are stored with the guild configuration. Gateway handlers call in
//! here to decide what to post or which role to change.

pub mod reaction_roles;
pub mod vanity;
pub mod welcome;

pub use reaction_roles::{ReactionRole, ReactionRoles, emoji_key, role_for};
pub use vanity::{
    BOOSTER_DEBOUNCE, BoosterSettings, Debounce, VANITY_DEBOUNCE, VanityChange, VanitySettings,
    custom_status,
};
pub use welcome::{Greeted, LinkButton, WelcomeSettings};
