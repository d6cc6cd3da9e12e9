use crate::{COMMAND_TARGET, CONSOLE_TARGET, Data, ENFORCEMENT_TARGET, ERROR_TARGET, Error};
use poise::{Context, FrameworkError};
use std::path::Path;
use std::time::Instant;
use tracing::{Level, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Targets,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Command log file name
pub const COMMAND_LOG_FILE: &str = "commands";
/// Enforcement log file name
pub const ENFORCEMENT_LOG_FILE: &str = "enforcement";

/// Initialize the logging system with console and file outputs
pub fn init() -> Result<(), Error> {
    if !Path::new(LOG_DIR).exists() {
        std::fs::create_dir_all(LOG_DIR)?;
    }

    let command_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, COMMAND_LOG_FILE);
    let enforcement_file =
        RollingFileAppender::new(Rotation::DAILY, LOG_DIR, ENFORCEMENT_LOG_FILE);

    // Human-readable console output
    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    // Command and command error logs (JSON format)
    let command_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file)
        .with_filter(
            Targets::new()
                .with_target(COMMAND_TARGET, Level::INFO)
                .with_target(ERROR_TARGET, Level::INFO),
        );

    // Punishments and remediations (JSON format)
    let enforcement_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(enforcement_file)
        .with_filter(Targets::new().with_target(ENFORCEMENT_TARGET, Level::INFO));

    // Default to INFO level if not specified, but filter out serenity heartbeat logs
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,serenity=error,tracing::span=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .with(enforcement_layer)
        .try_init()?;

    info!("Logging system initialized");
    Ok(())
}

/// Start time of the current invocation, kept in poise's invocation data
#[derive(Debug, Clone, Copy)]
struct CommandStart(Instant);

/// Milliseconds since `start`, zero when the start was never recorded
fn elapsed_ms(start: Option<CommandStart>) -> u64 {
    start.map_or(0, |CommandStart(at)| {
        u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)
    })
}

fn guild_label(ctx: Context<'_, Data, Error>) -> String {
    ctx.guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

/// Log the start of a command execution (pre-command hook)
pub async fn log_command_start(ctx: Context<'_, Data, Error>) {
    ctx.set_invocation_data(CommandStart(Instant::now())).await;

    let args = if ctx.command().parameters.is_empty() {
        String::new()
    } else {
        ctx.invocation_string()
    };

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = %ctx.author().id,
        arguments = %args,
        event = "start",
        "Command execution started"
    );
}

/// Log the end of a command execution (post-command hook)
pub async fn log_command_end(ctx: Context<'_, Data, Error>) {
    let start = ctx.invocation_data::<CommandStart>().await.map(|start| *start);
    let duration_ms = elapsed_ms(start);

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = %ctx.author().id,
        duration_ms = duration_ms,
        event = "end",
        "Command execution completed"
    );
}

/// Log errors that occur during command execution, replying where the user can see it
pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
    log_command_error(&error);

    let reply = match &error {
        FrameworkError::Command { error, ctx, .. } => Some((*ctx, format!("Error: {error}"))),
        FrameworkError::ArgumentParse { input, ctx, .. } => Some((
            *ctx,
            input.as_ref().map_or_else(
                || "Missing or invalid arguments.".to_string(),
                |input| format!("Could not understand `{input}`."),
            ),
        )),
        FrameworkError::CommandCheckFailed { ctx, .. } => Some((
            *ctx,
            "You need to be an administrator or the server owner to do that.".to_string(),
        )),
        _ => None,
    };

    if let Some((ctx, message)) = reply {
        if let Err(e) = ctx.say(message).await {
            error!(target: ERROR_TARGET, error = %e, "Failed to send error reply");
        }
    }
}

/// Log a framework error per variant
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = %ctx.author().id,
                error = %error,
                "Command error"
            );
        }
        FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let error_msg = error
                .as_ref()
                .map_or_else(|| "Check failed".to_string(), ToString::to_string);

            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = %ctx.author().id,
                error = %error_msg,
                "Command check failed"
            );
        }
        FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = %ctx.author().id,
                input = ?input,
                error = %error,
                "Argument parse error"
            );
        }
        err => {
            error!(
                target: ERROR_TARGET,
                error = ?err,
                "Other framework error"
            );
        }
    }
}

pub fn log_console(message: &str) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}
