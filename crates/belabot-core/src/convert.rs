// ── API-to-domain type conversions ──
//
// Bridges raw `belabot_api` push payloads into canonical
// `belabot_core::model` types, and stream settings back into a `start`
// request.

use std::collections::BTreeMap;

use belabot_api::protocol::push;
use belabot_api::protocol::request::Start;

use crate::model::{
    Interface, Modem, ModemLink, Notification, PipelineInfo, Sensors, StreamSettings,
};

// ── Stream settings ────────────────────────────────────────────────

impl From<&push::EncoderConfig> for StreamSettings {
    fn from(c: &push::EncoderConfig) -> Self {
        Self {
            pipeline: c.pipeline.clone(),
            max_bitrate: c.max_br,
            latency: c.srt_latency,
            audio_delay: c.delay,
            audio_source: c.asrc.clone(),
            audio_codec: c.acodec.clone(),
            srtla_addr: c.srtla_addr.clone(),
            srtla_port: c.srtla_port.clone(),
            srt_streamid: c.srt_streamid.clone(),
            bitrate_overlay: c.bitrate_overlay,
        }
    }
}

impl From<StreamSettings> for Start {
    fn from(s: StreamSettings) -> Self {
        Self {
            pipeline: s.pipeline,
            delay: s.audio_delay,
            max_br: s.max_bitrate,
            srtla_addr: s.srtla_addr,
            srtla_port: s.srtla_port,
            srt_streamid: s.srt_streamid,
            srt_latency: s.latency,
            bitrate_overlay: s.bitrate_overlay,
            asrc: s.audio_source,
            acodec: s.audio_codec,
        }
    }
}

// ── Network ────────────────────────────────────────────────────────

pub(crate) fn interfaces(netif: &BTreeMap<String, push::Netif>) -> BTreeMap<String, Interface> {
    netif
        .iter()
        .map(|(id, n)| {
            let iface = Interface {
                id: id.clone(),
                ip: n.ip.clone(),
                enabled: n.enabled,
                throughput: n.tp,
                queued: n.txb,
            };
            (id.clone(), iface)
        })
        .collect()
}

impl From<&push::ModemStatus> for ModemLink {
    fn from(s: &push::ModemStatus) -> Self {
        Self {
            connection: s.connection.clone(),
            network: s.network.clone(),
            network_type: s.network_type.clone(),
            signal: s.signal,
            roaming: s.roaming,
        }
    }
}

pub(crate) fn modem(id: &str, m: &push::Modem) -> Modem {
    Modem {
        id: id.to_owned(),
        ifname: m.ifname.clone(),
        name: m.name.clone(),
        link: m.status.as_ref().map(ModemLink::from),
    }
}

// ── Sensors ────────────────────────────────────────────────────────

impl From<&push::Sensors> for Sensors {
    fn from(s: &push::Sensors) -> Self {
        Self {
            temperature: s.soc_temperature.clone(),
            voltage: s.soc_voltage.clone(),
            current: s.soc_current.clone(),
        }
    }
}

// ── Pipelines ──────────────────────────────────────────────────────

/// Split `<device>/<name>`; names without a device prefix keep an empty device.
pub(crate) fn pipeline(id: &str, p: &push::PipelineInfo) -> PipelineInfo {
    let (device, name) = p.name.split_once('/').unwrap_or(("", p.name.as_str()));

    PipelineInfo {
        id: id.to_owned(),
        device: device.to_owned(),
        name: name.to_owned(),
        supports_audio_source: p.asrc,
        supports_audio_codec: p.acodec,
    }
}

// ── Notifications ──────────────────────────────────────────────────

impl From<&push::NotificationMessage> for Notification {
    fn from(n: &push::NotificationMessage) -> Self {
        Self {
            name: n.name.clone(),
            message: n.msg.clone(),
            kind: n.kind.clone(),
            persistent: n.is_persistent,
        }
    }
}
