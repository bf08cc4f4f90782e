// belabot-core: Encoder state, chat notifications and command routing between belabot-api and the chat client.

pub mod bot;
pub mod chat;
pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod naming;
pub mod notify;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bot::Bot;
pub use chat::ChatMessage;
pub use command::{CommandRouter, RebootProgress, RemoteControl, SettingsOverrides};
pub use config::{BotCommand, BotConfig, CommandSet, CommandSpec, MonitorConfig, Permission};
pub use error::CoreError;
pub use naming::InterfaceNames;
pub use notify::NotificationEngine;
pub use store::{StateDiff, StateStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    EncoderState, Interface, Modem, ModemLink, Notification, PipelineInfo, Sensors, Stream,
    StreamSettings, SubObject, Ups,
};
