//! Twitch chat client: IRC over websocket.
//!
//! Joins one channel, forwards every PRIVMSG into the core as a
//! [`ChatMessage`] and posts outbound lines back to the channel. Drops are
//! retried with the same backoff policy as the remote link; a rejected
//! login is fatal.

use belabot_api::ReconnectConfig;
use belabot_api::link::calculate_backoff;
use belabot_core::ChatMessage;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

pub const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Twitch drops PRIVMSGs longer than this.
const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub url: String,
    /// Bot login, lowercased.
    pub username: String,
    /// Token without the `oauth:` prefix.
    pub oauth: SecretString,
    /// Channel name without `#`, lowercased.
    pub channel: String,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Error)]
enum ChatError {
    #[error("login authentication failed")]
    LoginFailed,

    #[error("transport error: {0}")]
    Transport(String),
}

fn transport(e: impl std::fmt::Display) -> ChatError {
    ChatError::Transport(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Shut down on request; do not reconnect.
    Stopped,
    /// Server closed or asked us to reconnect.
    Closed,
}

pub struct TwitchClient {
    config: TwitchConfig,
}

impl TwitchClient {
    pub fn new(config: TwitchConfig) -> Self {
        Self { config }
    }

    /// Serve chat until `cancel` fires, the bot stops consuming, or the
    /// login is rejected.
    pub async fn run(
        &self,
        chat: mpsc::Sender<ChatMessage>,
        mut outbound: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) -> Result<(), CliError> {
        let mut attempt: u32 = 0;

        loop {
            let mut joined = false;
            let outcome = self
                .session(&chat, &mut outbound, &cancel, &mut joined)
                .await;
            if joined {
                attempt = 0;
            }

            match outcome {
                Ok(SessionEnd::Stopped) => return Ok(()),
                Ok(SessionEnd::Closed) => {
                    tracing::warn!("twitch chat connection closed");
                }
                Err(ChatError::LoginFailed) => {
                    tracing::error!(username = %self.config.username, "twitch login rejected");
                    return Err(CliError::ChatAuthFailed {
                        username: self.config.username.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "twitch chat connection failed");
                    if self
                        .config
                        .reconnect
                        .max_retries
                        .is_some_and(|max| attempt >= max)
                    {
                        return Err(CliError::ChatUnavailable {
                            reason: e.to_string(),
                        });
                    }
                }
            }

            let delay = calculate_backoff(attempt, &self.config.reconnect);
            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "reconnecting to twitch chat"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }

    async fn session(
        &self,
        chat: &mpsc::Sender<ChatMessage>,
        outbound: &mut mpsc::Receiver<String>,
        cancel: &CancellationToken,
        joined: &mut bool,
    ) -> Result<SessionEnd, ChatError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(transport)?;
        let (mut write, mut read) = ws.split();

        for line in self.login_lines() {
            write.send(Message::text(line)).await.map_err(transport)?;
        }
        tracing::debug!(channel = %self.config.channel, "twitch login sent");

        let channel = format!("#{}", self.config.channel);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Stopped);
                }

                line = outbound.recv() => {
                    let Some(line) = line else {
                        return Ok(SessionEnd::Stopped);
                    };
                    write
                        .send(Message::text(privmsg(&channel, &line)))
                        .await
                        .map_err(transport)?;
                }

                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(transport(e)),
                    };

                    for raw in text.as_str().lines() {
                        let Some(message) = IrcMessage::parse(raw) else {
                            continue;
                        };
                        tracing::trace!(command = message.command, "irc");

                        match message.command {
                            "PING" => {
                                let token = message.params.first().copied().unwrap_or("tmi.twitch.tv");
                                write
                                    .send(Message::text(format!("PONG :{token}")))
                                    .await
                                    .map_err(transport)?;
                            }
                            "001" => {
                                *joined = true;
                                tracing::info!(channel = %self.config.channel, "connected to twitch chat");
                            }
                            "NOTICE" if message.is_login_failure() => {
                                return Err(ChatError::LoginFailed);
                            }
                            "RECONNECT" => return Ok(SessionEnd::Closed),
                            "PRIVMSG" => {
                                let Some(chat_message) = message.chat_message() else {
                                    continue;
                                };
                                if chat.send(chat_message).await.is_err() {
                                    return Ok(SessionEnd::Stopped);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn login_lines(&self) -> [String; 4] {
        [
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_owned(),
            format!("PASS oauth:{}", self.config.oauth.expose_secret()),
            format!("NICK {}", self.config.username),
            format!("JOIN #{}", self.config.channel),
        ]
    }
}

fn privmsg(channel: &str, line: &str) -> String {
    let text: String = line
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .take(MAX_MESSAGE_CHARS)
        .collect();
    format!("PRIVMSG {channel} :{text}")
}

// ── IRC parsing ──────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
struct IrcMessage<'a> {
    tags: Vec<(&'a str, &'a str)>,
    prefix: Option<&'a str>,
    command: &'a str,
    /// Middle params followed by the trailing param, if any.
    params: Vec<&'a str>,
}

impl<'a> IrcMessage<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = Vec::new();
        if let Some(tagged) = rest.strip_prefix('@') {
            let (raw, tail) = tagged.split_once(' ')?;
            tags = raw
                .split(';')
                .map(|kv| kv.split_once('=').unwrap_or((kv, "")))
                .collect();
            rest = tail;
        }

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (p, tail) = prefixed.split_once(' ')?;
            prefix = Some(p);
            rest = tail;
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?;
        let mut params: Vec<&str> = words.collect();
        params.extend(trailing);

        Some(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    fn tag(&self, key: &str) -> Option<&'a str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn is_login_failure(&self) -> bool {
        self.params.last().is_some_and(|text| {
            text.contains("Login authentication failed")
                || text.contains("Improperly formatted auth")
        })
    }

    fn chat_message(&self) -> Option<ChatMessage> {
        let sender = self.prefix?.split('!').next()?.to_lowercase();
        let text = self.params.get(1)?;

        let badges = self.tag("badges").unwrap_or_default();
        let has_badge = |name: &str| {
            badges
                .split(',')
                .any(|badge| badge.split('/').next() == Some(name))
        };

        Some(ChatMessage {
            broadcaster: has_badge("broadcaster"),
            moderator: has_badge("moderator") || self.tag("mod") == Some("1"),
            vip: has_badge("vip") || self.tag("vip").is_some(),
            sender,
            text: (*text).to_owned(),
        })
    }
}
