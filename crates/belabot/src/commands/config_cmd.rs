//! Config subcommand handlers.

use std::path::Path;

use belabot_config::{
    Config, Secret, load_config, resolve_secret, save_config, split_remote_url, store_secret,
};
use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Prompt(e.to_string())
}

fn load(path: &Path) -> Result<Config, CliError> {
    load_config(path).map_err(|e| CliError::config(e, path))
}

/// Ask where a secret should live. Returns the plaintext to write to the
/// config file, or `None` when it went to the keyring.
fn place_secret(
    path: &Path,
    secret: Secret,
    label: &str,
    value: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        store_secret(secret, &value).map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
            path: path.display().to_string(),
        })?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn confirm(prompt: &str, default: bool) -> Result<bool, CliError> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(prompt_err)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config_path();

    match args.command {
        ConfigCommand::Init => init(&path),

        ConfigCommand::Show => {
            let config = load(&path)?.redacted();
            let rendered = toml::to_string_pretty(&config).map_err(|e| CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
                path: path.display().to_string(),
            })?;
            print!("{rendered}");
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Validate => {
            let config = load(&path)?;
            config.validate().map_err(|e| CliError::config(e, &path))?;
            config
                .to_link_config()
                .map_err(|e| CliError::config(e, &path))?;
            resolve_secret(Secret::TwitchOauth, config.twitch.bot_oauth.as_deref())
                .map_err(|e| CliError::config(e, &path))?;

            eprintln!("✓ {} is valid", path.display());
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(path: &Path) -> Result<(), CliError> {
    eprintln!("belabot configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    if path.exists() && !confirm("A config file already exists. Overwrite it?", false)? {
        eprintln!("Aborted, nothing written.");
        return Ok(());
    }

    let mut config = Config::default();

    // 1. BELABOX Cloud
    let remote: String = Input::new()
        .with_prompt("BELABOX Cloud remote URL (from the cloud dashboard)")
        .validate_with(|input: &String| {
            split_remote_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;
    let (remote_url, remote_key) = split_remote_url(&remote).map_err(|e| CliError::config(e, path))?;
    config.belabox.remote_url = remote_url;
    config.belabox.remote_key = place_secret(path, Secret::RemoteKey, "remote key", remote_key)?;

    // 2. Monitoring
    let monitor = &mut config.belabox.monitor;
    monitor.modems = confirm("Announce modems going offline or coming back?", monitor.modems)?;
    monitor.notifications = confirm(
        "Relay BELABOX notifications to chat?",
        monitor.notifications,
    )?;
    monitor.ups = confirm("Announce UPS power changes?", monitor.ups)?;
    if monitor.ups {
        monitor.ups_plugged_in = Input::new()
            .with_prompt("Voltage at which the UPS counts as plugged in")
            .default(monitor.ups_plugged_in)
            .interact_text()
            .map_err(prompt_err)?;
    }
    monitor.network = confirm("Announce network interface changes?", monitor.network)?;

    // 3. Twitch
    config.twitch.bot_username = Input::new()
        .with_prompt("Twitch bot username")
        .interact_text()
        .map_err(prompt_err)?;
    config.twitch.channel = Input::new()
        .with_prompt("Twitch channel to join")
        .interact_text()
        .map_err(prompt_err)?;

    let oauth = rpassword::prompt_password("Twitch bot OAuth token: ").map_err(prompt_err)?;
    if oauth.trim().is_empty() {
        return Err(CliError::Validation {
            field: "twitch.bot_oauth".into(),
            reason: "OAuth token cannot be empty".into(),
            path: path.display().to_string(),
        });
    }
    config.twitch.bot_oauth = place_secret(path, Secret::TwitchOauth, "OAuth token", oauth)?;

    let admins: String = Input::new()
        .with_prompt("Admins, comma separated (optional)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    config.twitch.admins = admins
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    // 4. Write
    config.normalize();
    config.insert_default_commands();
    config.validate().map_err(|e| CliError::config(e, path))?;
    save_config(&config, path).map_err(|e| CliError::config(e, path))?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("\n  Start the bot: belabot run");
    Ok(())
}
