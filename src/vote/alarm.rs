//! Timer seam for closing a voting window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

/// A scheduled window closure came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmFired {
    /// Deadline of the window this alarm was scheduled for. A window
    /// reopened since then has a different deadline.
    pub deadline: DateTime<Utc>,
}

/// Schedules a future [`AlarmFired`] delivery.
pub trait Alarm: Send + Sync {
    fn schedule(&self, after: Duration, deadline: DateTime<Utc>);
}

/// Sleeps on a tokio task, then delivers on an `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelAlarm {
    tx: mpsc::Sender<AlarmFired>,
}

impl ChannelAlarm {
    /// Creates the alarm and the receiver the closer task listens on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlarmFired>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Alarm for ChannelAlarm {
    fn schedule(&self, after: Duration, deadline: DateTime<Utc>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if tx.send(AlarmFired { deadline }).await.is_err() {
                debug!(%deadline, "Vote alarm fired after closer stopped");
            }
        });
    }
}
