//! Persistent, authenticated control channel to BELABOX Cloud.
//!
//! A [`RemoteLink`] owns one background task that connects, authenticates
//! with the remote key, relays pushes to registered handlers, correlates
//! request/response pairs by id, and reconnects with exponential backoff
//! whenever the socket drops.
//!
//! ```rust,ignore
//! use belabot_api::{LinkConfig, RemoteLink, Request};
//!
//! let link = RemoteLink::new(LinkConfig::new(url, key));
//! link.on_push(|push| tracing::debug!(kind = push.kind(), "push"));
//! link.connect().await?;
//! link.request(Request::bitrate(2500)).await?;
//! link.shutdown();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use futures_util::{SinkExt, Stream, StreamExt};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::protocol::{Inbound, Push, Request, Response, decode_frame, encode_message, encode_request};

/// Public BELABOX Cloud relay endpoint.
pub const DEFAULT_URL: &str = "wss://remote.belabox.net/ws/remote";

/// Remote protocol version sent with the auth key.
pub const PROTOCOL_VERSION: u32 = 6;

/// Callback invoked on the receive loop for every push.
pub type PushHandler = Arc<dyn Fn(&Push) + Send + Sync>;

type Pending = oneshot::Sender<Result<Value, Error>>;
type FirstOutcome = oneshot::Sender<Result<(), Error>>;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── LinkConfig ───────────────────────────────────────────────────────

/// Everything the link needs to reach and authenticate with the relay.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub url: Url,
    pub key: SecretString,
    pub protocol_version: u32,
    /// Bound on a single request/response round trip. Default: 10s.
    pub request_timeout: Duration,
    /// Bound on the `auth/key` answer. Default: 10s.
    pub handshake_timeout: Duration,
    /// Interval between keepalive frames while ready. Default: 5s.
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl LinkConfig {
    pub fn new(url: Url, key: SecretString) -> Self {
        Self {
            url,
            key,
            protocol_version: PROTOCOL_VERSION,
            request_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Session state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

/// Observable view of the session, published through a `watch` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: LinkState,
    pub last_error: Option<String>,
    /// Consecutive failed attempts since the link was last ready.
    pub attempt: u32,
}

// ── RemoteLink ───────────────────────────────────────────────────────

/// Handle to the remote session. Cheap to clone; all clones share one
/// background task.
#[derive(Clone)]
pub struct RemoteLink {
    inner: Arc<Inner>,
}

struct Inner {
    config: LinkConfig,
    status: watch::Sender<SessionStatus>,
    handlers: ArcSwap<Vec<PushHandler>>,
    pending: DashMap<u64, Pending>,
    next_id: AtomicU64,
    writer: ArcSwapOption<mpsc::UnboundedSender<Message>>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl RemoteLink {
    pub fn new(config: LinkConfig) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            inner: Arc::new(Inner {
                config,
                status,
                handlers: ArcSwap::from_pointee(Vec::new()),
                pending: DashMap::new(),
                next_id: AtomicU64::new(1),
                writer: ArcSwapOption::empty(),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Register a callback for unsolicited pushes.
    ///
    /// Handlers run on the receive loop and must not block.
    pub fn on_push<F>(&self, handler: F)
    where
        F: Fn(&Push) + Send + Sync + 'static,
    {
        let handler: PushHandler = Arc::new(handler);
        self.inner.handlers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
    }

    /// Spawn the connection loop and wait for the outcome of the first
    /// attempt.
    ///
    /// The loop keeps reconnecting regardless of what this returns. Calling
    /// it again reports whether the link is currently ready.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return if self.state() == LinkState::Ready {
                Ok(())
            } else {
                Err(Error::NotConnected)
            };
        }

        // Several crypto backends may be linked in; pick one for rustls.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (first_tx, first_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(first_tx).await;
        });

        first_rx.await.unwrap_or(Err(Error::Shutdown))
    }

    /// Send a request and wait for its correlated response.
    ///
    /// Fails fast with [`Error::NotConnected`] unless the link is ready.
    pub async fn request(&self, request: Request) -> Result<Value, Error> {
        if self.state() != LinkState::Ready {
            return Err(Error::NotConnected);
        }
        let Some(writer) = self.inner.writer.load_full() else {
            return Err(Error::NotConnected);
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_request(id, &request)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        tracing::debug!(id, verb = request.verb(), "sending request");
        if writer.send(Message::text(frame)).is_err() {
            self.inner.pending.remove(&id);
            return Err(Error::NotConnected);
        }

        let after = self.inner.config.request_timeout;
        match tokio::time::timeout(after, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Shutdown),
            Err(_) => {
                self.inner.pending.remove(&id);
                tracing::warn!(id, verb = request.verb(), "request timed out");
                Err(Error::Timeout { after })
            }
        }
    }

    pub fn state(&self) -> LinkState {
        self.inner.status.borrow().state
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    /// Watch session state transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Number of requests still awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.len()
    }

    /// Stop the background task, close the socket and fail pending requests.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.writer.store(None);
        self.inner.fail_pending(|| Error::Shutdown);
    }
}

// ── Background reconnection loop ─────────────────────────────────────

impl Inner {
    /// Main loop: connect → authenticate → serve → on error, backoff → reconnect.
    async fn run(&self, first: FirstOutcome) {
        let mut first = Some(first);
        let mut attempt: u32 = 0;

        loop {
            self.set_state(LinkState::Connecting);

            let mut reached_ready = false;
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.session(&mut reached_ready, &mut first) => result,
            };

            self.writer.store(None);
            self.fail_pending(|| Error::Transport("connection lost".into()));

            if reached_ready {
                attempt = 0;
            }

            let message = match result {
                Ok(()) => "connection closed".to_owned(),
                Err(e) => {
                    if e.is_auth() {
                        tracing::error!(error = %e, "BELABOX Cloud rejected the remote key");
                    } else if e.is_transient() {
                        tracing::warn!(error = %e, attempt, "remote link error");
                    } else {
                        tracing::error!(error = %e, attempt, "unexpected remote link error");
                    }
                    let message = e.to_string();
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Err(e));
                    }
                    message
                }
            };

            self.status.send_modify(|s| {
                s.state = LinkState::Disconnected;
                s.last_error = Some(message);
                s.attempt = attempt;
            });

            if let Some(max) = self.config.reconnect.max_retries {
                if attempt >= max {
                    tracing::error!(max_retries = max, "reconnection limit reached, giving up");
                    break;
                }
            }

            let delay = calculate_backoff(attempt, &self.config.reconnect);
            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "waiting before reconnect"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            attempt = attempt.saturating_add(1);
        }

        self.writer.store(None);
        self.fail_pending(|| Error::Shutdown);
        self.set_state(LinkState::Disconnected);
        tracing::debug!("remote link loop exiting");
    }

    // ── Single connection lifecycle ──────────────────────────────────

    async fn session(
        &self,
        reached_ready: &mut bool,
        first: &mut Option<FirstOutcome>,
    ) -> Result<(), Error> {
        tracing::info!(url = %self.config.url, "connecting to BELABOX Cloud");

        let (ws, _response) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(transport)?;
        let (mut write, mut read) = ws.split();

        self.set_state(LinkState::Authenticating);
        let auth = encode_message(&Request::auth_key(
            self.config.key.clone(),
            self.config.protocol_version,
        ))?;
        write.send(Message::text(auth)).await.map_err(transport)?;

        let after = self.config.handshake_timeout;
        tokio::time::timeout(after, self.await_auth(&mut read))
            .await
            .map_err(|_| Error::Protocol(format!("no authentication answer within {after:?}")))??;

        let (tx, mut outbound) = mpsc::unbounded_channel();
        self.writer.store(Some(Arc::new(tx)));
        self.status.send_modify(|s| {
            s.state = LinkState::Ready;
            s.last_error = None;
            s.attempt = 0;
        });
        *reached_ready = true;
        if let Some(tx) = first.take() {
            let _ = tx.send(Ok(()));
        }
        tracing::info!("remote link ready");

        let keepalive_frame = encode_message(&Request::keepalive())?;
        let period = self.config.keepalive_interval;
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(message) = outbound.recv() => {
                    write.send(message).await.map_err(transport)?;
                }
                _ = keepalive.tick() => {
                    tracing::trace!("sending keepalive");
                    write
                        .send(Message::text(keepalive_frame.clone()))
                        .await
                        .map_err(transport)?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.dispatch(text.as_str());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(cf) = frame {
                                tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                            }
                            return Ok(());
                        }
                        Some(Err(e)) => return Err(transport(e)),
                        None => return Ok(()),
                        Some(Ok(_)) => {
                            // Binary, Ping, Pong, Frame
                        }
                    }
                }
            }
        }
    }

    /// Read frames until the `auth/key` answer arrives. Pushes that arrive
    /// first are still delivered.
    async fn await_auth<S>(&self, read: &mut S) -> Result<(), Error>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match self.dispatch(text.as_str()) {
                    Some(true) => return Ok(()),
                    Some(false) => {
                        return Err(Error::Authentication {
                            message: "remote key rejected".into(),
                        });
                    }
                    None => {}
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::Transport(
                        "connection closed during authentication".into(),
                    ));
                }
                Some(Err(e)) => return Err(transport(e)),
                Some(Ok(_)) => {}
            }
        }
    }

    // ── Frame dispatch ───────────────────────────────────────────────

    /// Route every entry of a text frame. Returns the auth outcome if the
    /// frame carried one.
    fn dispatch(&self, text: &str) -> Option<bool> {
        tracing::trace!(frame = text, "frame received");

        let entries = match decode_frame(text) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                return None;
            }
        };

        let mut auth = None;
        for entry in entries {
            match entry {
                Inbound::Auth { accepted } => auth = Some(accepted),
                Inbound::Response(response) => self.resolve(response),
                Inbound::Push(push) => {
                    let handlers = self.handlers.load();
                    for handler in handlers.iter() {
                        handler(&push);
                    }
                }
                Inbound::Unknown { key } => {
                    tracing::debug!(key, "ignoring unknown message kind");
                }
            }
        }
        auth
    }

    fn resolve(&self, response: Response) {
        let id = response.id;
        if let Some((_, tx)) = self.pending.remove(&id) {
            let _ = tx.send(response.into_result());
        } else {
            tracing::debug!(id, "response for unknown or expired request");
        }
    }

    fn fail_pending(&self, reason: impl Fn() -> Error) {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(reason()));
            }
        }
    }

    fn set_state(&self, state: LinkState) {
        self.status.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }
}

fn transport(e: tungstenite::Error) -> Error {
    Error::Transport(e.to_string())
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
