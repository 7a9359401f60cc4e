//! EventSub request header names and lookup.
//!
//! `HeaderMap` lookups are case-insensitive, so these lower-case names match
//! the platform's `Twitch-Eventsub-*` spelling.

use axum::http::HeaderMap;

/// Unique ID of the delivery.
pub const MESSAGE_ID: &str = "twitch-eventsub-message-id";
/// RFC 3339 time the platform sent the delivery.
pub const MESSAGE_TIMESTAMP: &str = "twitch-eventsub-message-timestamp";
/// `sha256=<hex>` signature over id, timestamp, and body.
pub const MESSAGE_SIGNATURE: &str = "twitch-eventsub-message-signature";
/// `notification`, `webhook_callback_verification`, or `revocation`.
pub const MESSAGE_TYPE: &str = "twitch-eventsub-message-type";
/// The subscription type that produced a notification.
pub const SUBSCRIPTION_TYPE: &str = "twitch-eventsub-subscription-type";

/// Returns a header value if present and valid UTF-8.
pub fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
