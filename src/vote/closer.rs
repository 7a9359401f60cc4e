//! Background task that closes voting windows when their alarm fires.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::alarm::AlarmFired;
use super::tally::VoteTally;
use crate::chat::ChatSink;
use crate::lock::LockConfig;
use crate::store::KeyValueStore;

/// Receives [`AlarmFired`] messages until `shutdown` is cancelled or every
/// sender is gone, posting each closed window's summary to chat.
pub async fn run_vote_closer<S, C>(
    store: Arc<S>,
    chat: Arc<C>,
    lock_config: LockConfig,
    mut alarms: mpsc::Receiver<AlarmFired>,
    shutdown: CancellationToken,
) where
    S: KeyValueStore,
    C: ChatSink,
{
    info!("Vote closer started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, stopping vote closer");
                break;
            }

            fired = alarms.recv() => {
                let Some(fired) = fired else {
                    info!("Alarm channel closed, stopping vote closer");
                    break;
                };
                close_window(store.as_ref(), chat.as_ref(), lock_config, fired).await;
            }
        }
    }
}

async fn close_window<S: KeyValueStore, C: ChatSink>(
    store: &S,
    chat: &C,
    lock_config: LockConfig,
    fired: AlarmFired,
) {
    let tally = VoteTally::new(store, lock_config);
    match tally.end_scheduled_window(fired.deadline).await {
        Ok(Some(summary)) => {
            if let Err(e) = chat.send_message(&summary).await {
                error!(error = %e, "Failed to post vote summary");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(deadline = %fired.deadline, error = %e, "Failed to close voting window"),
    }
}
