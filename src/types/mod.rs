//! Core identifier types shared across the service.

pub mod ids;

pub use ids::{MessageId, UserId};
