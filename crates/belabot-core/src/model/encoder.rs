// ── Encoder snapshot ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::network::{Interface, Modem};
use super::power::{Sensors, Ups};
use super::stream::{PipelineInfo, Stream, StreamSettings};

/// Which part of the snapshot a push replaced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum SubObject {
    Online,
    Interfaces,
    Modems,
    Ups,
    Sensors,
    Stream,
    Pipelines,
    Notifications,
    Revisions,
}

/// A belaUI toast message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub message: String,
    /// `success`, `warning`, `error`, ...
    pub kind: String,
    pub persistent: bool,
}

/// Last-known encoder state. `None` means no authoritative push yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    /// Encoder connected to the cloud relay.
    pub online: Option<bool>,
    pub interfaces: Option<BTreeMap<String, Interface>>,
    pub modems: Option<BTreeMap<String, Modem>>,
    pub ups: Option<Ups>,
    pub sensors: Option<Sensors>,
    pub stream: Option<Stream>,
    pub pipelines: Option<BTreeMap<String, PipelineInfo>>,
    /// Notifications carried by the most recent `notification` push.
    pub notifications: Option<Vec<Notification>>,
    pub revisions: Option<BTreeMap<String, String>>,
}

impl EncoderState {
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.running)
    }

    pub fn settings(&self) -> Option<&StreamSettings> {
        self.stream.as_ref().and_then(|s| s.settings.as_ref())
    }

    pub fn audio_sources(&self) -> &[String] {
        self.stream
            .as_ref()
            .map(|s| s.audio_sources.as_slice())
            .unwrap_or_default()
    }

    /// Pipeline currently selected in the stream settings.
    pub fn current_pipeline(&self) -> Option<&PipelineInfo> {
        let id = &self.settings()?.pipeline;
        self.pipelines.as_ref()?.get(id)
    }

    pub fn interface(&self, id: &str) -> Option<&Interface> {
        self.interfaces.as_ref()?.get(id)
    }
}
