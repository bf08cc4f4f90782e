//! `belabot run`: serve chat commands until interrupted.

use belabot_api::{ReconnectConfig, RemoteLink};
use belabot_config::{Secret, load_config, resolve_secret};
use belabot_core::Bot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::twitch::{TWITCH_IRC_URL, TwitchClient, TwitchConfig};

/// Chat lines buffered in either direction.
const CHANNEL_CAPACITY: usize = 64;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config_path();
    let config = load_config(&path).map_err(|e| CliError::config(e, &path))?;
    config.validate().map_err(|e| CliError::config(e, &path))?;

    let bot_config = config.to_bot_config().map_err(|e| CliError::config(e, &path))?;
    let link_config = config.to_link_config().map_err(|e| CliError::config(e, &path))?;
    let oauth = resolve_secret(Secret::TwitchOauth, config.twitch.bot_oauth.as_deref())
        .map_err(|e| CliError::config(e, &path))?;

    tracing::info!(
        config = %path.display(),
        channel = %config.twitch.channel,
        relay = %link_config.url,
        "starting belabot"
    );

    let (chat_tx, chat_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let bot = Bot::new(bot_config, RemoteLink::new(link_config), outbound_tx);
    let bot_task = tokio::spawn(bot.run(chat_rx, cancel.clone()));

    let twitch = TwitchClient::new(TwitchConfig {
        url: TWITCH_IRC_URL.to_owned(),
        username: config.twitch.bot_username.clone(),
        oauth,
        channel: config.twitch.channel.clone(),
        reconnect: ReconnectConfig::default(),
    });
    let result = twitch.run(chat_tx, outbound_rx, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = bot_task.await {
        tracing::error!(error = %e, "bot task failed");
    }
    result
}
