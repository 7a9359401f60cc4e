//! EventSub notification types.
//!
//! Only the fields the bot acts on are modelled. Unknown subscription types
//! are kept as [`Notification::Other`] so they can be acknowledged and
//! logged.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Subscription type for chat messages in the broadcaster's channel.
pub const CHAT_MESSAGE: &str = "channel.chat.message";

/// Subscription types the service registers for.
pub const SUBSCRIPTION_TYPES: [&str; 5] = [
    CHAT_MESSAGE,
    "channel.chat.notification",
    "channel.shared_chat.begin",
    "channel.shared_chat.update",
    "channel.shared_chat.end",
];

/// A verified, decoded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// A chat message was sent in the channel.
    ChatMessage(ChatMessageEvent),

    /// Any other subscription type; acknowledged without action.
    Other { subscription_type: String },
}

/// A chat badge, e.g. `{"set_id": "subscriber", "id": "12"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub set_id: String,
    #[serde(default)]
    pub id: String,
}

impl Badge {
    pub fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            id: "1".to_string(),
        }
    }
}

/// A `channel.chat.message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub broadcaster_user_id: UserId,
    pub chatter_user_id: UserId,

    /// Lower-case login of the sender.
    pub chatter_user_login: String,

    /// Display name of the sender.
    pub chatter_user_name: String,

    /// Chat message ID (not the webhook message ID).
    pub message_id: String,

    /// Plain text of the message.
    pub text: String,

    pub badges: Vec<Badge>,
}

impl ChatMessageEvent {
    pub fn has_badge(&self, set_id: &str) -> bool {
        self.badges.iter().any(|b| b.set_id == set_id)
    }
}
