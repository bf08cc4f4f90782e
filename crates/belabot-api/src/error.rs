use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `belabot-api` crate.
///
/// Covers every failure mode of the remote control channel: connection,
/// authentication, request correlation, and wire decoding.
/// `belabot-core` maps these into user-facing replies.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// BELABOX Cloud rejected the remote key.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connect failure, dropped connection, or failed write.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The link is not in the `Ready` state; nothing was sent.
    #[error("Not connected to BELABOX Cloud")]
    NotConnected,

    /// No response with a matching id arrived in time.
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The link was shut down while the operation was pending.
    #[error("Remote link shut down")]
    Shutdown,

    // ── Remote ──────────────────────────────────────────────────────
    /// The encoder answered the request with an error result.
    #[error("Request rejected by BELABOX: {message}")]
    RemoteRejected { message: String },

    /// The peer broke the expected message sequence.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON decoding failed, with the raw frame for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// JSON encoding of an outbound request failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for failures the reconnect loop is expected to recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::NotConnected | Self::Protocol(_)
        )
    }

    /// Returns `true` if the remote key was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
