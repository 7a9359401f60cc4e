//! Inbound EventSub webhook handling.
//!
//! This module provides:
//! - Signature verification for webhook deliveries (HMAC-SHA256)
//! - Payload decoding into typed events
//! - Routing of verified deliveries by message type
//! - Suppression of redelivered notifications

pub mod dedupe;
pub mod events;
pub mod headers;
pub mod parser;
pub mod router;
pub mod signature;

pub use dedupe::{DeliveryLog, SEEN_DELIVERIES_KEY};
pub use events::{Badge, ChatMessageEvent, Notification};
pub use parser::{ParseError, parse_challenge, parse_notification};
pub use router::{AuthFailure, Disposition, MessageType, NotificationRouter, RouteError};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify, verify_signature,
};
