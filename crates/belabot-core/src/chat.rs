// ── Chat boundary types ──

use crate::config::Permission;

/// One inbound chat message, as delivered by the chat client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    /// Login name of the sender, lowercased by the chat client.
    pub sender: String,
    pub broadcaster: bool,
    pub moderator: bool,
    pub vip: bool,
    pub text: String,
}

impl ChatMessage {
    /// Message from a user without any badge.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Highest role granted by the platform badges.
    pub fn role(&self) -> Permission {
        if self.broadcaster {
            Permission::Broadcaster
        } else if self.moderator {
            Permission::Moderator
        } else if self.vip {
            Permission::Vip
        } else {
            Permission::Public
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_badge_wins() {
        let mut message = ChatMessage::new("viewer", "!bbs");
        assert_eq!(message.role(), Permission::Public);

        message.vip = true;
        message.moderator = true;
        assert_eq!(message.role(), Permission::Moderator);
    }
}
