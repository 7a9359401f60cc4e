//! The chat sign-up queue.
//!
//! Viewers join with a chess-site profile name and are served in order.
//! Subscribers jump ahead of non-subscribers but keep insertion order among
//! themselves, so the queue is always a priority prefix followed by a
//! non-priority suffix.
//!
//! [`Queue`] holds the ordering rules and is pure. [`QueueManager`] loads the
//! queue from the store, applies one operation under the critical-section
//! lock, and writes the whole queue back.

mod manager;
mod model;

pub use manager::{QUEUE_KEY, QueueError, QueueManager, read_queue};
pub use model::{EnqueueOutcome, Queue, QueueEntry};
