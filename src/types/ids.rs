//! Newtype wrappers for platform identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! chatter ID where a webhook message ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// An EventSub webhook message ID (`Twitch-Eventsub-Message-Id`).
///
/// Unique per notification; redeliveries of the same notification reuse
/// it, which is what [`crate::webhooks::DeliveryLog`] keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        MessageId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId(s)
    }
}

/// A numeric platform user ID, carried as a string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        UserId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn message_id_serializes_as_bare_string(s in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}") {
            let id = MessageId::new(&s);
            let json = serde_json::to_string(&id).unwrap();
            prop_assert_eq!(json, format!("\"{}\"", s));
        }

        #[test]
        fn user_id_display_matches_inner(s in "[0-9]{1,12}") {
            prop_assert_eq!(UserId::new(&s).to_string(), s);
        }
    }
}
