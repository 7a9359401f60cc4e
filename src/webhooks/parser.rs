//! EventSub payload parser.
//!
//! Decodes the JSON body of a verified delivery. Malformed bodies yield a
//! [`ParseError`]; unknown subscription types are not errors.

use serde::Deserialize;
use thiserror::Error;

use super::events::{Badge, CHAT_MESSAGE, ChatMessageEvent, Notification};
use crate::types::UserId;

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// No subscription type in either the header or the body.
    #[error("subscription type not given")]
    MissingSubscriptionType,
}

#[derive(Debug, Deserialize)]
struct RawChallenge {
    challenge: String,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    subscription: Option<RawSubscription>,
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawChatMessage {
    broadcaster_user_id: String,
    chatter_user_id: String,
    chatter_user_login: String,
    #[serde(default)]
    chatter_user_name: String,
    #[serde(default)]
    message_id: String,
    message: RawMessageBody,
    #[serde(default)]
    badges: Vec<Badge>,
}

#[derive(Debug, Deserialize)]
struct RawMessageBody {
    text: String,
}

/// Extracts the challenge token from a `webhook_callback_verification` body.
///
/// ```
/// use en_passant::webhooks::parse_challenge;
///
/// let body = br#"{"challenge": "pogchamp-kappa-360noscope-vohiyo", "subscription": {}}"#;
/// assert_eq!(parse_challenge(body).unwrap(), "pogchamp-kappa-360noscope-vohiyo");
/// ```
pub fn parse_challenge(body: &[u8]) -> Result<String, ParseError> {
    let raw: RawChallenge = serde_json::from_slice(body)?;
    Ok(raw.challenge)
}

/// Decodes a `notification` body.
///
/// `subscription_type` comes from the subscription-type header; if the
/// header was absent the body's `subscription.type` is used.
pub fn parse_notification(
    subscription_type: Option<&str>,
    body: &[u8],
) -> Result<Notification, ParseError> {
    let raw: RawNotification = serde_json::from_slice(body)?;
    let kind = match (subscription_type, &raw.subscription) {
        (Some(header), _) => header.to_string(),
        (None, Some(sub)) => sub.kind.clone(),
        (None, None) => return Err(ParseError::MissingSubscriptionType),
    };

    if kind != CHAT_MESSAGE {
        return Ok(Notification::Other {
            subscription_type: kind,
        });
    }

    let chat: RawChatMessage = serde_json::from_value(raw.event)?;
    Ok(Notification::ChatMessage(ChatMessageEvent {
        broadcaster_user_id: UserId::new(chat.broadcaster_user_id),
        chatter_user_id: UserId::new(chat.chatter_user_id),
        chatter_user_login: chat.chatter_user_login,
        chatter_user_name: chat.chatter_user_name,
        message_id: chat.message_id,
        text: chat.message.text,
        badges: chat.badges,
    }))
}
