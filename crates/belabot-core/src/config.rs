// ── Runtime bot configuration ──
//
// These types describe *what* the bot reacts to and who may trigger it.
// They never touch disk: belabot-config loads and validates the file and
// hands a `BotConfig` in.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::naming::InterfaceNames;

/// Chat role required to run a command.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Public < Vip < Moderator < Broadcaster`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Permission {
    #[default]
    Public,
    Vip,
    Moderator,
    Broadcaster,
}

/// Every command the bot understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum BotCommand {
    AudioDelay,
    AudioSrc,
    Bitrate,
    Latency,
    Modems,
    Network,
    Pipeline,
    Poweroff,
    Restart,
    Sensor,
    Start,
    Stats,
    Stop,
}

impl BotCommand {
    /// Default chat trigger and permission for a command.
    pub fn default_spec(self) -> CommandSpec {
        let (trigger, permission) = match self {
            Self::AudioDelay => ("!bbd", Permission::Broadcaster),
            Self::AudioSrc => ("!bba", Permission::Broadcaster),
            Self::Bitrate => ("!bbb", Permission::Broadcaster),
            Self::Latency => ("!bbl", Permission::Broadcaster),
            Self::Modems => ("!bbm", Permission::Public),
            Self::Network => ("!bbt", Permission::Broadcaster),
            Self::Pipeline => ("!bbp", Permission::Broadcaster),
            Self::Poweroff => ("!bbpo", Permission::Broadcaster),
            Self::Restart => ("!bbrs", Permission::Broadcaster),
            Self::Sensor => ("!bbsensor", Permission::Public),
            Self::Start => ("!bbstart", Permission::Broadcaster),
            Self::Stats => ("!bbs", Permission::Public),
            Self::Stop => ("!bbstop", Permission::Broadcaster),
        };

        CommandSpec {
            command: self,
            trigger: trigger.to_owned(),
            permission,
        }
    }

    /// Argument shape shown in usage replies.
    pub fn usage(self) -> &'static str {
        match self {
            Self::AudioDelay => "<-2000 - 2000 ms>",
            Self::AudioSrc => "<audio source>",
            Self::Bitrate => "<500 - 12000 kbps>",
            Self::Latency => "<100 - 4000 ms>",
            Self::Network => "<interface>",
            Self::Pipeline => "<pipeline>",
            _ => "",
        }
    }
}

/// One configured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: BotCommand,
    pub trigger: String,
    pub permission: Permission,
}

// ── CommandSet ───────────────────────────────────────────────────────

/// Configured commands indexed by trigger. Triggers are unique and
/// compared lowercased.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    by_trigger: HashMap<String, CommandSpec>,
}

impl CommandSet {
    pub fn new(specs: impl IntoIterator<Item = CommandSpec>) -> Result<Self, CoreError> {
        let mut by_trigger: HashMap<String, CommandSpec> = HashMap::new();

        for mut spec in specs {
            spec.trigger = spec.trigger.trim().to_lowercase();
            if spec.trigger.is_empty() {
                return Err(CoreError::Config {
                    message: format!("empty trigger for {}", spec.command),
                });
            }
            if let Some(existing) = by_trigger.get(&spec.trigger) {
                return Err(CoreError::Config {
                    message: format!(
                        "trigger {} is used by both {} and {}",
                        spec.trigger, existing.command, spec.command
                    ),
                });
            }
            by_trigger.insert(spec.trigger.clone(), spec);
        }

        Ok(Self { by_trigger })
    }

    /// The full default command set.
    pub fn defaults() -> Self {
        use strum::IntoEnumIterator;

        let by_trigger = BotCommand::iter()
            .map(BotCommand::default_spec)
            .map(|spec| (spec.trigger.clone(), spec))
            .collect();
        Self { by_trigger }
    }

    /// Find the command for an already lowercased trigger.
    pub fn lookup(&self, trigger: &str) -> Option<&CommandSpec> {
        self.by_trigger.get(trigger)
    }

    pub fn trigger_for(&self, command: BotCommand) -> Option<&str> {
        self.by_trigger
            .values()
            .find(|spec| spec.command == command)
            .map(|spec| spec.trigger.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.by_trigger.values()
    }

    pub fn len(&self) -> usize {
        self.by_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trigger.is_empty()
    }
}

// ── MonitorConfig ────────────────────────────────────────────────────

/// Which automatic chat notifications are enabled, and their tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub modems: bool,
    pub notifications: bool,
    pub ups: bool,
    pub network: bool,
    /// Voltage at or above which the UPS counts as plugged in.
    pub ups_plugged_in: f64,
    /// Dead band below `ups_plugged_in` before "unplugged" is declared.
    pub ups_hysteresis: f64,
    pub notification_timeout: Duration,
    pub network_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            modems: true,
            notifications: true,
            ups: false,
            network: false,
            ups_plugged_in: 5.1,
            ups_hysteresis: 0.05,
            notification_timeout: Duration::from_secs(30),
            network_timeout: Duration::from_secs(30),
        }
    }
}

// ── BotConfig ────────────────────────────────────────────────────────

/// Everything the core needs, already validated.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub commands: CommandSet,
    /// Chat users treated as broadcaster, lowercased.
    pub admins: Vec<String>,
    pub interface_names: InterfaceNames,
    pub monitor: MonitorConfig,
    /// Pause between stopping and restarting the stream on settings changes.
    pub restart_delay: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            commands: CommandSet::defaults(),
            admins: Vec::new(),
            interface_names: InterfaceNames::default(),
            monitor: MonitorConfig::default(),
            restart_delay: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn permissions_are_totally_ordered() {
        assert!(Permission::Public < Permission::Vip);
        assert!(Permission::Vip < Permission::Moderator);
        assert!(Permission::Moderator < Permission::Broadcaster);
        assert_eq!(
            Permission::Vip.max(Permission::Broadcaster),
            Permission::Broadcaster
        );
    }

    #[test]
    fn permission_parses_case_insensitively() {
        assert_eq!("moderator".parse::<Permission>().unwrap(), Permission::Moderator);
        assert_eq!("VIP".parse::<Permission>().unwrap(), Permission::Vip);
        assert!("owner".parse::<Permission>().is_err());
    }

    #[test]
    fn default_set_covers_every_command() {
        use strum::IntoEnumIterator;

        let set = CommandSet::defaults();
        assert_eq!(set.len(), BotCommand::iter().count());
        assert_eq!(set.lookup("!bbm").unwrap().command, BotCommand::Modems);
        assert_eq!(set.trigger_for(BotCommand::Poweroff), Some("!bbpo"));
        assert_eq!(
            set.lookup("!bbs").unwrap().permission,
            Permission::Public
        );
    }

    #[test]
    fn duplicate_triggers_are_rejected() {
        let specs = vec![
            CommandSpec {
                command: BotCommand::Start,
                trigger: "!go".into(),
                permission: Permission::Broadcaster,
            },
            CommandSpec {
                command: BotCommand::Stop,
                trigger: "!GO".into(),
                permission: Permission::Broadcaster,
            },
        ];

        let err = CommandSet::new(specs).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn triggers_are_normalized() {
        let set = CommandSet::new([CommandSpec {
            command: BotCommand::Stats,
            trigger: " !Stats ".into(),
            permission: Permission::Public,
        }])
        .unwrap();

        assert!(set.lookup("!stats").is_some());
    }
}
