// belabot-api: Async client for the BELABOX Cloud remote control protocol

pub mod error;
pub mod link;
pub mod protocol;

pub use error::Error;
pub use link::{LinkConfig, LinkState, PushHandler, ReconnectConfig, RemoteLink, SessionStatus};
pub use protocol::{Inbound, Push, Request, Response};
