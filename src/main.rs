use std::sync::Arc;
use std::time::Duration;

use guild_warden::{Data, Error, Settings, commands, handlers, logging};
use poise::serenity_prelude::{self as serenity, GatewayIntents, UserId};
use tracing::{error, info};

/// How often idle tracker windows and message trails are pruned
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let settings = Settings::from_env()?;
    // Fail before connecting if the window settings are unusable
    settings.tracker_settings()?;

    let token = settings.token.clone();
    let prefix = settings.prefix.clone();
    let owners = settings.owner_ids.iter().map(|&id| UserId::new(id)).collect();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            owners,
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx).await;
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx).await;
                })
            },
            on_error: |error| Box::pin(logging::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console("Registering commands and loading guild data");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let data = Data::load(settings, Arc::clone(&ctx.http)).await?;
                data.giveaways.resume(&ctx.http);

                // Gateway handlers read the same data through the type map
                ctx.data.write().await.insert::<Data>(data.clone());

                let maintenance = data.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
                    loop {
                        interval.tick().await;
                        maintenance.prune(chrono::Utc::now());
                    }
                });

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_PRESENCES;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler)
        .framework(framework)
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        error!("Fatal error: {err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
