//! Admin, moderation, engagement and community commands
//!
//! Every command is guild-only and available both as a prefix and a slash command.

mod antinuke;
mod automod;
mod buttonrole;
mod giveaway;
mod jail;
mod purge;
mod ticket;
mod vanity;
mod welcome;

use crate::{Context, Data, Error};
use crate::moderation::{GuildModerationConfig, ViolationCategory};
use crate::store;

pub use antinuke::antinuke;
pub use automod::automod;
pub use buttonrole::buttonrole;
pub use giveaway::giveaway;
pub use jail::jail;
pub use purge::purge;
pub use ticket::ticket;
pub use vanity::{booster, vanity};
pub use welcome::welcome;

/// Every command the framework registers
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        antinuke(),
        automod(),
        booster(),
        buttonrole(),
        giveaway(),
        jail(),
        purge(),
        ticket(),
        vanity(),
        welcome(),
    ]
}

/// Bot owners, the guild owner, administrators and bypass admins may change settings
pub async fn can_configure(ctx: Context<'_>) -> Result<bool, Error> {
    let author = ctx.author().id;
    if ctx.data().settings.is_owner(author.get()) {
        return Ok(true);
    }
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };

    let roles = ctx
        .author_member()
        .await
        .map(|m| m.roles.clone())
        .unwrap_or_default();
    let (is_owner, is_admin) = match ctx.guild() {
        Some(guild) => (
            guild.owner_id == author,
            roles
                .iter()
                .filter_map(|id| guild.roles.get(id))
                .any(|role| role.permissions.administrator()),
        ),
        None => (false, false),
    };
    if is_owner || is_admin {
        return Ok(true);
    }

    let config = ctx.data().store().get_or_default(guild_id.get()).await?;
    Ok(config.bypass_admins.contains(&author.get()))
}

/// Guild id for a guild-only command
fn scope_id(ctx: Context<'_>) -> Result<u64, Error> {
    Ok(ctx
        .guild_id()
        .ok_or("This command only works in a server")?
        .get())
}

/// Apply `f` to the invoking guild's configuration and persist it
async fn update_config<F>(ctx: Context<'_>, f: F) -> Result<(), Error>
where
    F: FnOnce(&mut GuildModerationConfig) + Send + 'static,
{
    let scope_id = scope_id(ctx)?;
    store::modify(&**ctx.data().store(), scope_id, f).await?;
    Ok(())
}

/// Highest threshold the tracker window for `category` can reach
fn threshold_cap(ctx: Context<'_>, category: ViolationCategory) -> usize {
    ctx.data().moderation.settings().spec_for(category).capacity()
}

/// `"enabled"` / `"disabled"`
fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
