//! CLI error types with miette diagnostics.

use belabot_config::ConfigError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(belabot::validation),
        help("Fix the value in {path}, or rerun: belabot config init")
    )]
    Validation {
        field: String,
        reason: String,
        path: String,
    },

    #[error("No {what} configured")]
    #[diagnostic(
        code(belabot::no_credentials),
        help(
            "Store it with: belabot config init\n\
             Or set {env_var}."
        )
    )]
    NoCredentials { what: String, env_var: String },

    #[error("Could not load configuration")]
    #[diagnostic(
        code(belabot::config),
        help("Expected at: {path}\nCreate one with: belabot config init")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    // ── Chat ─────────────────────────────────────────────────────────

    #[error("Twitch rejected the login for {username}")]
    #[diagnostic(
        code(belabot::chat_auth),
        help(
            "Check twitch.bot_username and the OAuth token.\n\
             Tokens expire; generate a new one and run: belabot config init"
        )
    )]
    ChatAuthFailed { username: String },

    #[error("Lost connection to Twitch chat: {reason}")]
    #[diagnostic(code(belabot::chat_unavailable))]
    ChatUnavailable { reason: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Prompt failed: {0}")]
    #[diagnostic(code(belabot::prompt))]
    Prompt(String),

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Wrap a config-crate error, attaching the path being worked on.
    pub fn config(err: ConfigError, path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::Validation {
                field,
                reason,
                path,
            },
            ConfigError::NoCredentials { what } => {
                let env_var = if what.contains("Twitch") {
                    belabot_config::Secret::TwitchOauth.env_var()
                } else {
                    belabot_config::Secret::RemoteKey.env_var()
                };
                Self::NoCredentials {
                    what,
                    env_var: env_var.into(),
                }
            }
            source => Self::Config { path, source },
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NoCredentials { .. } | Self::Config { .. } => {
                exit_code::USAGE
            }
            Self::ChatAuthFailed { .. } => exit_code::AUTH,
            Self::ChatUnavailable { .. } | Self::Prompt(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}
