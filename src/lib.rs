pub mod commands;
pub mod community;
pub mod data;
pub mod duration;
pub mod enforcement;
pub mod giveaway;
pub mod handlers;
pub mod jail;
pub mod logging;
pub mod moderation;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod ticket;
pub mod transcript;

pub const BOT_NAME: &str = "guild_warden";
pub const COMMAND_TARGET: &str = "guild_warden::command";
pub const ERROR_TARGET: &str = "guild_warden::error";
pub const EVENT_TARGET: &str = "guild_warden::handlers";
pub const ENFORCEMENT_TARGET: &str = "guild_warden::enforcement";
pub const CONSOLE_TARGET: &str = "guild_warden";

pub use data::{Data, DataInner};
pub use settings::Settings;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
