// ── Inbound push payloads ──
//
// Shapes of the unsolicited state updates belaUI relays through
// BELABOX Cloud. Every struct is lenient (`#[serde(default)]`) because
// older encoder images omit fields that newer ones send.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An unsolicited state update, one variant per state sub-object.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    /// Full stream configuration (`config`).
    Config(EncoderConfig),
    /// Encoder reachability as seen by the cloud relay (`remote`).
    Encoder(RemoteEncoder),
    /// Network interface table (`netif`).
    Netif(BTreeMap<String, Netif>),
    /// Cellular modem table (`modems`).
    Modems(BTreeMap<String, Modem>),
    /// SoC / UPS sensor readings (`sensors`).
    Sensors(Sensors),
    /// Streaming status and audio sources (`status`).
    Status(Status),
    /// belaUI toast notifications (`notification`).
    Notification(Notifications),
    /// Live max-bitrate change (`bitrate`).
    Bitrate(Bitrate),
    /// Available encoding pipelines (`pipelines`).
    Pipelines(BTreeMap<String, PipelineInfo>),
    /// Software component revisions (`revisions`).
    Revisions(BTreeMap<String, String>),
}

impl Push {
    /// Wire key this push arrived under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Encoder(_) => "remote",
            Self::Netif(_) => "netif",
            Self::Modems(_) => "modems",
            Self::Sensors(_) => "sensors",
            Self::Status(_) => "status",
            Self::Notification(_) => "notification",
            Self::Bitrate(_) => "bitrate",
            Self::Pipelines(_) => "pipelines",
            Self::Revisions(_) => "revisions",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEncoder {
    pub is_encoder_online: bool,
    pub version: Option<i64>,
}

/// Stream settings as stored by belaUI. Doubles as the payload of a
/// `start` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub max_br: u32,
    pub delay: i32,
    pub pipeline: String,
    pub srt_latency: u64,
    pub srt_streamid: String,
    pub srtla_addr: String,
    pub srtla_port: String,
    pub bitrate_overlay: bool,
    pub asrc: Option<String>,
    pub acodec: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Netif {
    pub ip: String,
    /// Bytes queued for transmission.
    pub txb: u64,
    /// Throughput in bytes per second.
    pub tp: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modem {
    pub ifname: Option<String>,
    pub name: Option<String>,
    pub status: Option<ModemStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemStatus {
    /// `connected`, `connecting`, `disconnected`, ...
    pub connection: String,
    pub network: Option<String>,
    pub network_type: Option<String>,
    pub signal: u32,
    pub roaming: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensors {
    #[serde(rename = "SoC voltage")]
    pub soc_voltage: Option<String>,
    #[serde(rename = "SoC current")]
    pub soc_current: Option<String>,
    #[serde(rename = "SoC temperature")]
    pub soc_temperature: Option<String>,
}

/// belaUI sends the full status on connect and single-field updates
/// afterwards, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub is_streaming: Option<bool>,
    pub asrcs: Option<Vec<String>>,
    pub available_updates: Option<AvailableUpdates>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailableUpdates {
    pub package_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub show: Vec<NotificationMessage>,
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationMessage {
    pub name: String,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u32,
    pub is_dismissable: bool,
    pub is_persistent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bitrate {
    pub max_br: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInfo {
    pub acodec: bool,
    pub asrc: bool,
    /// `<device>/<pipeline>`, e.g. `jetson/h265_hdmi`.
    pub name: String,
}

/// Parse a sensor reading such as `"5.12 V"` into its numeric part.
pub fn parse_reading(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}
