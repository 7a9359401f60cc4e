//! Routing of verified deliveries by message type.
//!
//! | message type | disposition |
//! |---|---|
//! | `webhook_callback_verification` | echo the challenge |
//! | `notification` | decode and hand the event on |
//! | `revocation` | acknowledge |
//! | anything else | [`RouteError::UnknownMessageType`] |
//!
//! Nothing is decoded unless the signature verifies and the timestamp is
//! within the replay window. Authentication failures are reported separately
//! from routing failures so they can be logged as security events.

use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::events::Notification;
use super::headers::{MESSAGE_TIMESTAMP, MESSAGE_TYPE, SUBSCRIPTION_TYPE, header_str};
use super::parser::{ParseError, parse_challenge, parse_notification};
use super::signature::verify;

/// The `Twitch-Eventsub-Message-Type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Verification,
    Notification,
    Revocation,
}

impl MessageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webhook_callback_verification" => Some(MessageType::Verification),
            "notification" => Some(MessageType::Notification),
            "revocation" => Some(MessageType::Revocation),
            _ => None,
        }
    }
}

/// What to do with a verified delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Answer 200 with the challenge as the body.
    Challenge(String),
    /// Answer 204 after acting on the event.
    Notification(Notification),
    /// Answer 204; the platform has cancelled a subscription.
    Revocation { subscription_type: Option<String> },
}

/// Why a delivery failed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("signature mismatch or missing signing headers")]
    Signature,

    #[error("message timestamp is not RFC 3339")]
    Timestamp,

    #[error("message timestamp is {age_secs}s away from now")]
    Stale { age_secs: i64 },
}

/// Rejections of a delivery.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("authentication failed: {0}")]
    Authentication(AuthFailure),

    #[error("unknown message type: {0:?}")]
    UnknownMessageType(Option<String>),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] ParseError),
}

/// Verifies and classifies inbound deliveries.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    secret: Vec<u8>,
    max_age: Duration,
}

impl NotificationRouter {
    pub fn new(secret: impl Into<Vec<u8>>, max_age: Duration) -> Self {
        Self {
            secret: secret.into(),
            max_age,
        }
    }

    /// Verifies the delivery and decides its disposition.
    pub fn route(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Disposition, RouteError> {
        self.authenticate(headers, body, now)
            .map_err(RouteError::Authentication)?;

        let message_type = header_str(headers, MESSAGE_TYPE);
        match message_type.and_then(MessageType::parse) {
            Some(MessageType::Verification) => Ok(Disposition::Challenge(parse_challenge(body)?)),
            Some(MessageType::Notification) => {
                let subscription_type = header_str(headers, SUBSCRIPTION_TYPE);
                Ok(Disposition::Notification(parse_notification(
                    subscription_type,
                    body,
                )?))
            }
            Some(MessageType::Revocation) => Ok(Disposition::Revocation {
                subscription_type: header_str(headers, SUBSCRIPTION_TYPE).map(str::to_string),
            }),
            None => Err(RouteError::UnknownMessageType(
                message_type.map(str::to_string),
            )),
        }
    }

    fn authenticate(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), AuthFailure> {
        if !verify(headers, body, &self.secret) {
            return Err(AuthFailure::Signature);
        }

        // verify() has already required the header to be present.
        let sent = header_str(headers, MESSAGE_TIMESTAMP)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .ok_or(AuthFailure::Timestamp)?;
        let age_secs = (now - sent.with_timezone(&Utc)).num_seconds();
        if age_secs.unsigned_abs() > self.max_age.as_secs() {
            return Err(AuthFailure::Stale { age_secs });
        }
        Ok(())
    }
}
