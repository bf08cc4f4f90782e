//! Clap derive structures for the `belabot` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// belabot -- control and monitor a BELABOX from Twitch chat
#[derive(Debug, Parser)]
#[command(
    name = "belabot",
    version,
    about = "Control and monitor a BELABOX from Twitch chat",
    long_about = "Connects to BELABOX Cloud and Twitch chat, answers chat commands\n\
        such as !bbs and !bbb, and posts automatic notifications about\n\
        modems, UPS and network state.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, short = 'c', env = "BELABOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalOpts {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(belabot_config::config_path)
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to BELABOX Cloud and Twitch and serve chat commands
    Run,

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the resolved configuration with secrets redacted
    Show,

    /// Print the config file path
    Path,

    /// Check the configuration and exit
    Validate,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
