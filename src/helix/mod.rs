//! Platform (Helix) API client.
//!
//! Covers the three calls the bot makes: posting chat messages, counting
//! EventSub subscriptions, and creating webhook subscriptions. The OAuth
//! token is supplied by configuration; refreshing it is out of scope.

mod client;
mod error;

pub use client::{HelixClient, HelixCredentials};
pub use error::{HelixError, HelixErrorKind};
