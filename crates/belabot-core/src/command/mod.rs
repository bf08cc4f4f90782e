//! Chat command routing.
//!
//! [`CommandRouter`] maps a chat message to a configured command, checks the
//! sender's role, validates arguments, and only then talks to the encoder
//! through a [`RemoteControl`]. Every recognized command produces exactly
//! one reply; unrecognized text produces none.

mod args;
pub(crate) mod format;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use belabot_api::protocol::request::{Command, Netif};
use belabot_api::{LinkState, RemoteLink, Request};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

pub use args::{Action, round_to_step};

use crate::chat::ChatMessage;
use crate::config::{BotConfig, CommandSet, CommandSpec, Permission};
use crate::error::CoreError;
use crate::model::{EncoderState, StreamSettings, SubObject};
use crate::naming::InterfaceNames;
use crate::notify::PREFIX;
use crate::store::{StateDiff, StateStore};

// ── Remote seam ──────────────────────────────────────────────────────

/// The part of the link the router needs.
pub trait RemoteControl: Send + Sync + 'static {
    fn link_state(&self) -> LinkState;

    fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Value, belabot_api::Error>> + Send;
}

impl RemoteControl for RemoteLink {
    fn link_state(&self) -> LinkState {
        self.state()
    }

    fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Value, belabot_api::Error>> + Send {
        RemoteLink::request(self, request)
    }
}

impl<T: RemoteControl> RemoteControl for Arc<T> {
    fn link_state(&self) -> LinkState {
        T::link_state(self)
    }

    fn request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Value, belabot_api::Error>> + Send {
        T::request(self, request)
    }
}

// ── Pending settings ─────────────────────────────────────────────────

/// Settings changed from chat that the encoder only picks up on the next
/// start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub pipeline: Option<String>,
    pub latency: Option<u64>,
    pub audio_delay: Option<i32>,
    pub audio_source: Option<String>,
}

impl SettingsOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(&self, settings: &mut StreamSettings) {
        if let Some(pipeline) = &self.pipeline {
            settings.pipeline.clone_from(pipeline);
        }
        if let Some(latency) = self.latency {
            settings.latency = latency;
        }
        if let Some(delay) = self.audio_delay {
            settings.audio_delay = delay;
        }
        if let Some(source) = &self.audio_source {
            settings.audio_source = Some(source.clone());
        }
    }
}

/// Without an offline report, a stream push this long after the reboot
/// request counts as the encoder being back.
const REBOOT_OFFLINE_GRACE: Duration = Duration::from_secs(60);

/// A pending reboot is dropped if the encoder is not back by then.
const REBOOT_RESUME_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartPhase {
    Idle,
    /// Reboot sent while streaming; the stream is started again once the
    /// encoder is back.
    Pending { since: Instant, seen_offline: bool },
}

/// Where a pending reboot stands after a state diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootProgress {
    /// The encoder is back; the stream should be started again.
    Back,
    /// The encoder did not come back in time; the stream stays stopped.
    Abandoned,
}

// ── Router ───────────────────────────────────────────────────────────

pub struct CommandRouter<R> {
    remote: R,
    store: Arc<StateStore>,
    commands: CommandSet,
    admins: Vec<String>,
    names: InterfaceNames,
    restart_delay: Duration,
    /// Side channel for lines sent in the middle of a command.
    outbound: mpsc::Sender<String>,
    overrides: Mutex<SettingsOverrides>,
    restart: Mutex<RestartPhase>,
}

impl<R: RemoteControl> CommandRouter<R> {
    pub fn new(
        remote: R,
        store: Arc<StateStore>,
        config: &BotConfig,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            remote,
            store,
            commands: config.commands.clone(),
            admins: config.admins.clone(),
            names: config.interface_names.clone(),
            restart_delay: config.restart_delay,
            outbound,
            overrides: Mutex::new(SettingsOverrides::default()),
            restart: Mutex::new(RestartPhase::Idle),
        }
    }

    /// Reply to a chat message, or `None` when it is not a command.
    pub async fn handle(&self, message: &ChatMessage) -> Option<String> {
        let mut words = message.text.split_whitespace();
        let trigger = words.next()?.to_lowercase();
        let spec = self.commands.lookup(&trigger)?;
        let args: Vec<&str> = words.collect();

        let reply = match self.dispatch(spec, message, &args).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(
                    sender = %message.sender,
                    command = %spec.command,
                    error = %e,
                    "command failed"
                );
                e.to_string()
            }
        };

        Some(reply)
    }

    /// Settings that the next start request will carry.
    pub async fn pending_overrides(&self) -> SettingsOverrides {
        self.overrides.lock().await.clone()
    }

    /// Permission the sender holds; admins count as the broadcaster.
    pub fn permission_of(&self, message: &ChatMessage) -> Permission {
        if self
            .admins
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(&message.sender))
        {
            Permission::Broadcaster
        } else {
            message.role()
        }
    }

    async fn dispatch(
        &self,
        spec: &CommandSpec,
        message: &ChatMessage,
        args: &[&str],
    ) -> Result<String, CoreError> {
        if self.permission_of(message) < spec.permission {
            tracing::info!(
                sender = %message.sender,
                trigger = %spec.trigger,
                required = %spec.permission,
                "permission denied"
            );
            return Err(CoreError::PermissionDenied {
                trigger: spec.trigger.clone(),
            });
        }

        let action = Action::parse(spec.command, &spec.trigger, args)?;

        if self.remote.link_state() != LinkState::Ready {
            return Err(CoreError::NotConnected);
        }
        let state = self.store.snapshot();
        if state.online == Some(false) {
            return Err(CoreError::EncoderOffline);
        }

        tracing::info!(sender = %message.sender, ?action, "running command");
        self.execute(action, &state).await
    }

    async fn execute(&self, action: Action, state: &EncoderState) -> Result<String, CoreError> {
        match action {
            Action::Stats => format::stats(state, &self.names),
            Action::Modems => format::modems(state, &self.names),
            Action::Sensor => format::sensors(state),
            Action::Start => {
                if state.is_streaming() {
                    return Err(CoreError::AlreadyStreaming);
                }
                self.start_stream().await?;
                Ok("Starting BELABOX".into())
            }
            Action::Stop => {
                if !state.is_streaming() {
                    return Err(CoreError::NotStreaming);
                }
                self.remote.request(Request::stop()).await?;
                Ok("Stopping BELABOX".into())
            }
            Action::Restart => self.reboot(state).await,
            Action::Poweroff => {
                self.remote
                    .request(Request::Command(Command::Poweroff))
                    .await?;
                Ok("Powering off BELABOX".into())
            }
            Action::Bitrate(kbps) => {
                self.remote.request(Request::bitrate(kbps)).await?;
                Ok(format!("Changed max bitrate to {kbps} kbps"))
            }
            Action::Latency(None) => {
                let settings = self.effective_settings(state).await?;
                Ok(format!("Current SRT latency is {} ms", settings.latency))
            }
            Action::Latency(Some(ms)) => {
                self.change_settings(state, |o| o.latency = Some(ms)).await?;
                Ok(format!("Changed SRT latency to {ms} ms"))
            }
            Action::AudioDelay(None) => {
                let settings = self.effective_settings(state).await?;
                Ok(format!("Current audio delay is {} ms", settings.audio_delay))
            }
            Action::AudioDelay(Some(ms)) => {
                self.change_settings(state, |o| o.audio_delay = Some(ms))
                    .await?;
                Ok(format!("Changed audio delay to {ms} ms"))
            }
            Action::Network(token) => self.toggle_interface(state, &token).await,
            Action::Pipeline(query) => self.switch_pipeline(state, &query).await,
            Action::AudioSrc(query) => self.switch_audio_source(state, &query).await,
        }
    }

    // ── Stream control ───────────────────────────────────────────────

    async fn effective_settings(&self, state: &EncoderState) -> Result<StreamSettings, CoreError> {
        let mut settings = state
            .settings()
            .cloned()
            .ok_or_else(|| CoreError::unavailable("Stream settings"))?;
        self.overrides.lock().await.apply_to(&mut settings);
        Ok(settings)
    }

    /// Send `start` with the latest settings plus pending overrides.
    async fn start_stream(&self) -> Result<(), CoreError> {
        let state = self.store.snapshot();
        let settings = self.effective_settings(&state).await?;

        self.remote.request(Request::Start(settings.into())).await?;
        *self.overrides.lock().await = SettingsOverrides::default();
        Ok(())
    }

    /// Record a settings change; a running stream is restarted so the
    /// encoder picks it up.
    async fn change_settings(
        &self,
        state: &EncoderState,
        change: impl FnOnce(&mut SettingsOverrides),
    ) -> Result<(), CoreError> {
        if state.settings().is_none() {
            return Err(CoreError::unavailable("Stream settings"));
        }
        change(&mut *self.overrides.lock().await);

        if state.is_streaming() {
            self.restart_stream().await?;
        }
        Ok(())
    }

    async fn restart_stream(&self) -> Result<(), CoreError> {
        self.remote.request(Request::stop()).await?;
        self.say("Restarting the stream").await;
        tokio::time::sleep(self.restart_delay).await;
        self.start_stream().await
    }

    async fn say(&self, line: &str) {
        if self.outbound.send(line.to_owned()).await.is_err() {
            tracing::warn!(line, "chat output closed");
        }
    }

    // ── Reboot ───────────────────────────────────────────────────────

    async fn reboot(&self, state: &EncoderState) -> Result<String, CoreError> {
        let streaming = state.is_streaming();
        {
            let mut phase = self.restart.lock().await;
            if let RestartPhase::Pending { since, .. } = *phase {
                if since.elapsed() < REBOOT_RESUME_TIMEOUT {
                    return Err(CoreError::AlreadyRestarting);
                }
                tracing::warn!("dropping stale pending reboot");
            }
            *phase = if streaming {
                RestartPhase::Pending {
                    since: Instant::now(),
                    seen_offline: false,
                }
            } else {
                RestartPhase::Idle
            };
        }

        let result = async {
            if streaming {
                self.remote.request(Request::stop()).await?;
            }
            self.remote
                .request(Request::Command(Command::Reboot))
                .await
        }
        .await;

        if let Err(e) = result {
            *self.restart.lock().await = RestartPhase::Idle;
            return Err(e.into());
        }
        Ok("Rebooting BELABOX".into())
    }

    /// Follow a pending reboot through the state diffs.
    ///
    /// Only advances the bookkeeping; [`Self::finish_reboot`] does the
    /// talking, so callers can run it off their own loop.
    pub async fn observe(&self, diff: &StateDiff) -> Option<RebootProgress> {
        let mut phase = self.restart.lock().await;
        let RestartPhase::Pending {
            since,
            seen_offline,
        } = *phase
        else {
            return None;
        };
        let elapsed = since.elapsed();

        if elapsed >= REBOOT_RESUME_TIMEOUT {
            *phase = RestartPhase::Idle;
            tracing::warn!(
                elapsed_secs = elapsed.as_secs(),
                "encoder did not come back after reboot"
            );
            return Some(RebootProgress::Abandoned);
        }

        if diff.current.online == Some(false) {
            *phase = RestartPhase::Pending {
                since,
                seen_offline: true,
            };
            return None;
        }

        // The relay does not always report the encoder offline, for example
        // when the cloud link itself dropped during the reboot.
        let back = diff.touched(SubObject::Stream)
            && (seen_offline || elapsed >= REBOOT_OFFLINE_GRACE);
        if !back {
            return None;
        }

        *phase = RestartPhase::Idle;
        Some(RebootProgress::Back)
    }

    /// Act on the outcome of a reboot; the returned line announces it.
    pub async fn finish_reboot(&self, progress: RebootProgress) -> String {
        match progress {
            RebootProgress::Back => {
                tracing::info!("encoder back after reboot, starting stream");
                match self.start_stream().await {
                    Ok(()) => format!("{PREFIX}Reboot successful, starting the stream"),
                    Err(e) => {
                        format!("{PREFIX}Reboot successful, but the stream did not start: {e}")
                    }
                }
            }
            RebootProgress::Abandoned => format!(
                "{PREFIX}BELABOX did not come back after the reboot, the stream stays stopped"
            ),
        }
    }

    // ── Settings commands ────────────────────────────────────────────

    async fn toggle_interface(&self, state: &EncoderState, token: &str) -> Result<String, CoreError> {
        let interfaces = state
            .interfaces
            .as_ref()
            .filter(|ifaces| !ifaces.is_empty())
            .ok_or_else(|| CoreError::unavailable("Interfaces"))?;

        if interfaces.len() == 1 {
            return Err(CoreError::usage("You only have one connection!"));
        }

        let iface = self
            .names
            .resolve(token, interfaces)
            .ok_or_else(|| CoreError::usage("Interface not found"))?;

        let enabled = interfaces.values().filter(|i| i.enabled).count();
        if iface.enabled && enabled <= 1 {
            return Err(CoreError::usage("Can't disable all networks"));
        }

        let enable = !iface.enabled;
        self.remote
            .request(Request::Netif(Netif {
                name: iface.id.clone(),
                ip: iface.ip.clone(),
                enabled: enable,
            }))
            .await?;

        let name = self.names.display_interface(iface);
        Ok(format!(
            "{name} has been {}",
            if enable { "enabled" } else { "disabled" }
        ))
    }

    async fn switch_pipeline(&self, state: &EncoderState, query: &str) -> Result<String, CoreError> {
        let pipelines = state
            .pipelines
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CoreError::unavailable("Pipelines"))?;

        // Only offer pipelines for the hardware currently in use.
        let settings = self.effective_settings(state).await?;
        let device = pipelines
            .get(&settings.pipeline)
            .map(|current| current.device.clone());

        let candidates = pipelines
            .values()
            .filter(|p| device.as_ref().is_none_or(|d| &p.device == d))
            .map(|p| (p.name.clone(), p));
        let chosen = args::pick("Pipeline", query, candidates)?;

        let (id, name) = (chosen.id.clone(), chosen.display_name());
        self.change_settings(state, |o| o.pipeline = Some(id)).await?;
        Ok(format!("Changed pipeline to {name}"))
    }

    async fn switch_audio_source(
        &self,
        state: &EncoderState,
        query: &str,
    ) -> Result<String, CoreError> {
        let sources = state.audio_sources();
        if sources.is_empty() {
            return Err(CoreError::unavailable("Audio sources"));
        }

        let chosen = args::pick(
            "Audio source",
            query,
            sources.iter().map(|s| (s.clone(), s)),
        )?
        .clone();

        let source = chosen.clone();
        self.change_settings(state, |o| o.audio_source = Some(source))
            .await?;
        Ok(format!("Changed audio to {chosen}"))
    }
}
