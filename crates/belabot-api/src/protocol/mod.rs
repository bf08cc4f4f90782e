//! Wire format of the BELABOX Cloud remote channel.
//!
//! Every frame is a JSON object whose keys name the message kind. A single
//! inbound frame may carry several kinds at once (belaUI batches `netif`
//! and `sensors`, for instance), so [`decode_frame`] yields a list.
//!
//! Outbound requests that expect an answer carry a numeric `id` next to the
//! verb; the relay echoes it back inside a `response` message:
//!
//! ```text
//! → {"id":7,"bitrate":{"max_br":2500}}
//! ← {"response":{"id":7,"result":null}}
//! ← {"response":{"id":8,"error":"invalid bitrate"}}
//! ```

pub mod push;
pub mod request;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use push::Push;
pub use request::Request;

use crate::error::Error;

/// Answer to a correlated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// Turn an error answer into [`Error::RemoteRejected`].
    pub fn into_result(self) -> Result<Value, Error> {
        match self.error {
            Some(message) => Err(Error::RemoteRejected { message }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// One decoded entry of an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Outcome of the `auth/key` handshake.
    Auth { accepted: bool },
    /// Answer to a request sent with an id.
    Response(Response),
    /// Unsolicited state update.
    Push(Push),
    /// A message kind this client does not model (e.g. `wifi`, `updating`).
    Unknown { key: String },
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request,
}

/// Serialize a request that expects a correlated response.
pub fn encode_request(id: u64, request: &Request) -> Result<String, Error> {
    Ok(serde_json::to_string(&Envelope { id, request })?)
}

/// Serialize a fire-and-forget message (auth, keepalive).
pub fn encode_message(request: &Request) -> Result<String, Error> {
    Ok(serde_json::to_string(request)?)
}

/// Decode a text frame into its entries.
///
/// Fails only if the frame is not a JSON object. Entries whose payload does
/// not match the expected shape are logged and skipped so one malformed
/// field never hides the rest of the frame.
pub fn decode_frame(text: &str) -> Result<Vec<Inbound>, Error> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })?;

    let Value::Object(map) = value else {
        return Err(Error::Deserialization {
            message: "frame is not a JSON object".into(),
            body: text.to_owned(),
        });
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        match decode_entry(&key, value) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, key, "skipping malformed message");
            }
        }
    }

    Ok(entries)
}

fn decode_entry(key: &str, value: Value) -> Result<Inbound, serde_json::Error> {
    let push = match key {
        "response" => return Ok(Inbound::Response(serde_json::from_value(value)?)),
        "remote" => return decode_remote(value),
        "config" => Push::Config(serde_json::from_value(value)?),
        "netif" => Push::Netif(serde_json::from_value(value)?),
        "modems" => Push::Modems(serde_json::from_value(value)?),
        "sensors" => Push::Sensors(serde_json::from_value(value)?),
        "status" => Push::Status(serde_json::from_value(value)?),
        "notification" => Push::Notification(serde_json::from_value(value)?),
        "bitrate" => Push::Bitrate(serde_json::from_value(value)?),
        "pipelines" => Push::Pipelines(serde_json::from_value(value)?),
        "revisions" => Push::Revisions(serde_json::from_value(value)?),
        other => {
            return Ok(Inbound::Unknown {
                key: other.to_owned(),
            });
        }
    };

    Ok(Inbound::Push(push))
}

/// `remote` carries either the auth outcome or the encoder's online state.
fn decode_remote(value: Value) -> Result<Inbound, serde_json::Error> {
    let mut map: Map<String, Value> = serde_json::from_value(value)?;

    if let Some(auth) = map.remove("auth/key") {
        let accepted = auth.as_bool().unwrap_or(false);
        return Ok(Inbound::Auth { accepted });
    }

    Ok(Inbound::Push(Push::Encoder(serde_json::from_value(
        Value::Object(map),
    )?)))
}
