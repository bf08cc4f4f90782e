// ── Core error types ──
//
// User-facing errors from belabot-core. The `Display` text of every
// command-level variant is what ends up in chat, so chat users never see
// websocket or JSON details. The `From<belabot_api::Error>` impl
// translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Command errors ───────────────────────────────────────────────
    #[error("You don't have permission to use {trigger}")]
    PermissionDenied { trigger: String },

    /// Malformed or out-of-range arguments. The message is the full reply.
    #[error("{message}")]
    Usage { message: String },

    #[error("Already restarting, please wait")]
    AlreadyRestarting,

    #[error("Already streaming")]
    AlreadyStreaming,

    #[error("Not streaming")]
    NotStreaming,

    /// The encoder has not reported the data a command needs yet.
    #[error("{what} not available")]
    Unavailable { what: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Not connected to BELABOX Cloud")]
    NotConnected,

    #[error("BELABOX is offline")]
    EncoderOffline,

    #[error("Request timed out")]
    Timeout,

    #[error("BELABOX rejected the request: {message}")]
    Rejected { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(what: impl Into<String>) -> Self {
        Self::Unavailable { what: what.into() }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<belabot_api::Error> for CoreError {
    fn from(err: belabot_api::Error) -> Self {
        use belabot_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(_) | Api::NotConnected | Api::Shutdown => CoreError::NotConnected,
            Api::Timeout { .. } => CoreError::Timeout,
            Api::RemoteRejected { message } => CoreError::Rejected { message },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Protocol(message) => CoreError::Internal(format!("Protocol error: {message}")),
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::Serialization(e) => CoreError::Internal(format!("Serialization error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn transport_failures_read_as_not_connected() {
        for err in [
            belabot_api::Error::Transport("reset".into()),
            belabot_api::Error::NotConnected,
            belabot_api::Error::Shutdown,
        ] {
            assert_eq!(CoreError::from(err).to_string(), "Not connected to BELABOX Cloud");
        }
    }

    #[test]
    fn remote_errors_map_to_chat_replies() {
        let timeout = CoreError::from(belabot_api::Error::Timeout {
            after: Duration::from_secs(10),
        });
        assert_eq!(timeout.to_string(), "Request timed out");

        let rejected = CoreError::from(belabot_api::Error::RemoteRejected {
            message: "invalid bitrate".into(),
        });
        assert_eq!(
            rejected.to_string(),
            "BELABOX rejected the request: invalid bitrate"
        );
    }

    #[test]
    fn usage_displays_message_verbatim() {
        let err = CoreError::usage("No bitrate given");
        assert_eq!(err.to_string(), "No bitrate given");
        assert_eq!(CoreError::unavailable("Sensors").to_string(), "Sensors not available");
    }
}
