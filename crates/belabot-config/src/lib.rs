//! Configuration for the belabot binary.
//!
//! TOML or JSON file, `BELABOT_` environment overrides, secret resolution
//! (env + keyring + plaintext), and translation to the core's `BotConfig`
//! and the api's `LinkConfig`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use belabot_api::LinkConfig;
use belabot_api::link::DEFAULT_URL;
use belabot_core::{
    BotCommand, BotConfig, CommandSet, CommandSpec, InterfaceNames, MonitorConfig, Permission,
};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service all belabot secrets live under.
pub const KEYRING_SERVICE: &str = "belabot";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured")]
    NoCredentials { what: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to serialize config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── File structs ────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub belabox: Belabox,

    #[serde(default)]
    pub twitch: Twitch,

    /// Keyed by command name (`Start`, `Bitrate`, ...).
    #[serde(default)]
    pub commands: BTreeMap<String, CommandEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Belabox {
    /// Remote key (plaintext; prefer keyring or env var).
    pub remote_key: Option<String>,

    /// Relay endpoint.
    pub remote_url: String,

    /// Seconds to wait for a response from the encoder.
    pub request_timeout: u64,

    /// Seconds between stopping and restarting the stream on settings changes.
    pub restart_delay: u64,

    /// Display names keyed by interface id or IP address.
    pub custom_interface_name: BTreeMap<String, String>,

    pub monitor: Monitor,
}

impl Default for Belabox {
    fn default() -> Self {
        Self {
            remote_key: None,
            remote_url: DEFAULT_URL.into(),
            request_timeout: 10,
            restart_delay: 5,
            custom_interface_name: BTreeMap::new(),
            monitor: Monitor::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Monitor {
    pub modems: bool,
    pub notifications: bool,
    pub ups: bool,
    pub network: bool,
    /// Volts at or above which the UPS counts as plugged in.
    pub ups_plugged_in: f64,
    /// Volts below the threshold before the UPS counts as unplugged.
    pub ups_hysteresis: f64,
    /// Seconds.
    pub notification_timeout: u64,
    /// Seconds.
    pub network_timeout: u64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            modems: true,
            notifications: true,
            ups: false,
            network: false,
            ups_plugged_in: 5.1,
            ups_hysteresis: 0.05,
            notification_timeout: 30,
            network_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Twitch {
    pub bot_username: String,

    /// OAuth token (plaintext; prefer keyring or env var).
    pub bot_oauth: Option<String>,

    pub channel: String,

    /// Users treated as the broadcaster.
    pub admins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandEntry {
    /// Chat trigger, e.g. `!bbs`.
    pub command: String,
    pub permission: Permission,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the default config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "belabox", "belabot").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("belabot");
    p
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load config from `path` plus `BELABOT_` environment overrides
/// (`__` separates nested keys), then normalize and fill in missing
/// commands. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new().merge(Serialized::defaults(Config::default()));
    let figment = if is_json(path) {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    };

    let mut config: Config = figment
        .merge(Env::prefixed("BELABOT_").split("__"))
        .extract()?;

    config.normalize();
    config.insert_default_commands();
    Ok(config)
}

/// Write config as TOML, or JSON when the path ends in `.json`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let contents = if is_json(path) {
        serde_json::to_string_pretty(cfg)?
    } else {
        toml::to_string_pretty(cfg)?
    };
    std::fs::write(path, contents)?;
    Ok(())
}

// ── Normalization and validation ────────────────────────────────────

impl Config {
    /// Lowercase names and triggers, strip the `oauth:` token prefix.
    pub fn normalize(&mut self) {
        let twitch = &mut self.twitch;
        twitch.channel = twitch.channel.trim().trim_start_matches('#').to_lowercase();
        twitch.bot_username = twitch.bot_username.trim().to_lowercase();
        twitch.admins = twitch
            .admins
            .iter()
            .map(|admin| admin.trim().to_lowercase())
            .filter(|admin| !admin.is_empty())
            .collect();

        if let Some(oauth) = twitch.bot_oauth.as_mut() {
            let trimmed = oauth.trim();
            *oauth = trimmed
                .strip_prefix("oauth:")
                .unwrap_or(trimmed)
                .to_owned();
        }

        for entry in self.commands.values_mut() {
            entry.command = entry.command.trim().to_lowercase();
        }
    }

    /// Add the default trigger and permission for every command the file
    /// does not mention.
    pub fn insert_default_commands(&mut self) {
        use strum::IntoEnumIterator;

        for command in BotCommand::iter() {
            let known = self
                .commands
                .keys()
                .any(|name| BotCommand::from_str(name).is_ok_and(|c| c == command));
            if !known {
                let spec = command.default_spec();
                self.commands.insert(
                    command.to_string(),
                    CommandEntry {
                        command: spec.trigger,
                        permission: spec.permission,
                    },
                );
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .belabox
            .remote_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(invalid("belabox.remote_key", "must not be empty"));
        }
        self.remote_url()?;

        if self.twitch.channel.is_empty() {
            return Err(invalid("twitch.channel", "must not be empty"));
        }
        if self.twitch.bot_username.is_empty() {
            return Err(invalid("twitch.bot_username", "must not be empty"));
        }

        let monitor = &self.belabox.monitor;
        if monitor.ups_plugged_in <= 0.0 {
            return Err(invalid("belabox.monitor.ups_plugged_in", "must be positive"));
        }
        if monitor.ups_hysteresis < 0.0 || monitor.ups_hysteresis >= monitor.ups_plugged_in {
            return Err(invalid(
                "belabox.monitor.ups_hysteresis",
                "must be between 0 and ups_plugged_in",
            ));
        }
        if self.belabox.request_timeout == 0 {
            return Err(invalid("belabox.request_timeout", "must be positive"));
        }

        self.command_set().map(|_| ())
    }

    /// Parse and check the commands table.
    pub fn command_set(&self) -> Result<CommandSet, ConfigError> {
        let mut specs = Vec::with_capacity(self.commands.len());

        for (name, entry) in &self.commands {
            let field = format!("commands.{name}");
            let command = BotCommand::from_str(name)
                .map_err(|_| invalid(&field, format!("unknown command '{name}'")))?;

            let trigger = entry.command.trim();
            if trigger.is_empty() {
                return Err(invalid(&field, "trigger must not be empty"));
            }
            if trigger.contains(char::is_whitespace) {
                return Err(invalid(&field, "trigger must be a single word"));
            }

            specs.push(CommandSpec {
                command,
                trigger: trigger.to_owned(),
                permission: entry.permission,
            });
        }

        CommandSet::new(specs).map_err(|e| invalid("commands", e.to_string()))
    }

    pub fn remote_url(&self) -> Result<Url, ConfigError> {
        let url: Url = self
            .belabox
            .remote_url
            .parse()
            .map_err(|e| invalid("belabox.remote_url", format!("{e}")))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid(
                "belabox.remote_url",
                format!("expected a ws:// or wss:// URL, got {url}"),
            ));
        }
        Ok(url)
    }

    /// Copy safe to print: plaintext secrets replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let hide = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some("<redacted>".into());
            }
        };
        hide(&mut copy.belabox.remote_key);
        hide(&mut copy.twitch.bot_oauth);
        copy
    }

    // ── Translation ──────────────────────────────────────────────────

    /// Core settings: commands, admins, names, monitor thresholds.
    pub fn to_bot_config(&self) -> Result<BotConfig, ConfigError> {
        let monitor = &self.belabox.monitor;
        let names: HashMap<String, String> = self
            .belabox
            .custom_interface_name
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(BotConfig {
            commands: self.command_set()?,
            admins: self.twitch.admins.clone(),
            interface_names: InterfaceNames::new(names),
            monitor: MonitorConfig {
                modems: monitor.modems,
                notifications: monitor.notifications,
                ups: monitor.ups,
                network: monitor.network,
                ups_plugged_in: monitor.ups_plugged_in,
                ups_hysteresis: monitor.ups_hysteresis,
                notification_timeout: Duration::from_secs(monitor.notification_timeout),
                network_timeout: Duration::from_secs(monitor.network_timeout),
            },
            restart_delay: Duration::from_secs(self.belabox.restart_delay),
        })
    }

    /// Link settings with the remote key resolved.
    pub fn to_link_config(&self) -> Result<LinkConfig, ConfigError> {
        let key = resolve_secret(Secret::RemoteKey, self.belabox.remote_key.as_deref())?;
        let mut link = LinkConfig::new(self.remote_url()?, key);
        link.request_timeout = Duration::from_secs(self.belabox.request_timeout);
        Ok(link)
    }
}

// ── Remote URL ──────────────────────────────────────────────────────

/// Split the URL shown in BELABOX Cloud (`...?key=<remote key>`) into
/// the relay websocket endpoint and the key.
pub fn split_remote_url(input: &str) -> Result<(String, String), ConfigError> {
    let (_, query) = input
        .trim()
        .split_once("?key=")
        .ok_or_else(|| invalid("remote URL", "no key found"))?;

    let key = query.split('&').next().unwrap_or_default();
    if key.is_empty() {
        return Err(invalid("remote URL", "no key found"));
    }
    Ok((DEFAULT_URL.to_owned(), key.to_owned()))
}

// ── Secret resolution ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    RemoteKey,
    TwitchOauth,
}

impl Secret {
    pub fn env_var(self) -> &'static str {
        match self {
            Self::RemoteKey => "BELABOT_REMOTE_KEY",
            Self::TwitchOauth => "BELABOT_TWITCH_OAUTH",
        }
    }

    pub fn keyring_user(self) -> &'static str {
        match self {
            Self::RemoteKey => "remote-key",
            Self::TwitchOauth => "twitch-oauth",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::RemoteKey => "BELABOX remote key",
            Self::TwitchOauth => "Twitch OAuth token",
        }
    }
}

/// Resolve a secret: environment variable, then system keyring, then the
/// plaintext value from the config file.
pub fn resolve_secret(secret: Secret, plaintext: Option<&str>) -> Result<SecretString, ConfigError> {
    resolve_with(
        secret,
        plaintext,
        |name| std::env::var(name).ok(),
        |user| {
            keyring::Entry::new(KEYRING_SERVICE, user)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_with(
    secret: Secret,
    plaintext: Option<&str>,
    env: impl FnOnce(&str) -> Option<String>,
    keyring: impl FnOnce(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    let clean = |value: String| {
        let value = value.trim();
        let value = value.strip_prefix("oauth:").unwrap_or(value);
        (!value.is_empty()).then(|| value.to_owned())
    };

    env(secret.env_var())
        .and_then(clean)
        .or_else(|| keyring(secret.keyring_user()).and_then(clean))
        .or_else(|| plaintext.map(str::to_owned).and_then(clean))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            what: secret.describe().into(),
        })
}

/// Store a secret in the system keyring.
pub fn store_secret(secret: Secret, value: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, secret.keyring_user())
        .and_then(|entry| entry.set_password(value))
        .map_err(|e| invalid("keyring", e.to_string()))
}
