//! En Passant - a chess streamer's chat bot driven by EventSub webhooks.
//!
//! The library verifies and routes webhook deliveries, turns chat messages
//! into commands, and keeps the viewer sign-up queue and chat polls in a
//! remote key/value store shared by all invocations.

pub mod chat;
pub mod commands;
pub mod config;
pub mod helix;
pub mod lock;
pub mod queue;
pub mod server;
pub mod store;
pub mod types;
pub mod vote;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
