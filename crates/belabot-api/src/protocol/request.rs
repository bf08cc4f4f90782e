// ── Outbound requests ──
//
// Externally tagged so each request serializes as `{"<verb>": <args>}`,
// matching what belaUI expects from its own web client.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use super::push::EncoderConfig;

#[derive(Debug, Clone, PartialEq, Serialize, strum::IntoStaticStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Request {
    Bitrate(Bitrate),
    Command(Command),
    Keepalive(Option<()>),
    Netif(Netif),
    Remote(Remote),
    Start(Start),
    Stop(Option<()>),
}

impl Request {
    /// Verb used on the wire, handy for structured logging.
    pub fn verb(&self) -> &'static str {
        self.into()
    }

    pub fn keepalive() -> Self {
        Self::Keepalive(None)
    }

    pub fn stop() -> Self {
        Self::Stop(None)
    }

    pub fn bitrate(max_br: u32) -> Self {
        Self::Bitrate(Bitrate { max_br })
    }

    pub fn auth_key(key: SecretString, version: u32) -> Self {
        Self::Remote(Remote::AuthKey { key, version })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Poweroff,
    Reboot,
}

#[derive(Debug, Clone, Serialize)]
pub enum Remote {
    #[serde(rename = "auth/key")]
    AuthKey {
        #[serde(serialize_with = "expose")]
        key: SecretString,
        version: u32,
    },
}

impl PartialEq for Remote {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::AuthKey { key: a, version: va },
                Self::AuthKey { key: b, version: vb },
            ) => a.expose_secret() == b.expose_secret() && va == vb,
        }
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Start {
    pub pipeline: String,
    pub delay: i32,
    pub max_br: u32,
    pub srtla_addr: String,
    pub srtla_port: String,
    pub srt_streamid: String,
    pub srt_latency: u64,
    pub bitrate_overlay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asrc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
}

impl From<EncoderConfig> for Start {
    fn from(c: EncoderConfig) -> Self {
        Self {
            pipeline: c.pipeline,
            delay: c.delay,
            max_br: c.max_br,
            srtla_addr: c.srtla_addr,
            srtla_port: c.srtla_port,
            srt_streamid: c.srt_streamid,
            srt_latency: c.srt_latency,
            bitrate_overlay: c.bitrate_overlay,
            asrc: c.asrc,
            acodec: c.acodec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitrate {
    pub max_br: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netif {
    pub name: String,
    pub ip: String,
    pub enabled: bool,
}
