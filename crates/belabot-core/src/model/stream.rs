// ── Streaming pipeline domain types ──

use serde::{Deserialize, Serialize};

/// Stream settings as stored by belaUI, and as sent back on start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Pipeline id (a hash in belaUI's pipeline table).
    pub pipeline: String,
    /// Maximum encoder bitrate in kbps.
    pub max_bitrate: u32,
    /// SRT latency in milliseconds.
    pub latency: u64,
    /// Audio delay in milliseconds.
    pub audio_delay: i32,
    pub audio_source: Option<String>,
    pub audio_codec: Option<String>,
    pub srtla_addr: String,
    pub srtla_port: String,
    pub srt_streamid: String,
    pub bitrate_overlay: bool,
}

/// The `pipeline` sub-object: whether the encoder streams, with what
/// settings, and which audio inputs it offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub running: bool,
    pub settings: Option<StreamSettings>,
    pub audio_sources: Vec<String>,
}

/// One entry of the encoder's pipeline table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub id: String,
    /// Hardware family, e.g. `jetson`.
    pub device: String,
    /// Pipeline name without the device prefix, e.g. `h265_hdmi`.
    pub name: String,
    pub supports_audio_source: bool,
    pub supports_audio_codec: bool,
}

impl PipelineInfo {
    /// Human form of the name: lowercase, underscores as spaces.
    pub fn display_name(&self) -> String {
        self.name.to_lowercase().replace('_', " ")
    }
}
