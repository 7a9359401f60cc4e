//! Store-backed queue operations.
//!
//! One `QueueManager` lives for one webhook invocation. Read-only operations
//! load the queue lazily (under the read-prepare lock) and reuse that copy
//! for the rest of the invocation. Mutations follow the sequence
//! acquire critical lock → read current queue → mutate → write whole queue
//! → release, and refresh the cached copy from what they wrote.
//!
//! Mutations always re-read inside the critical section. A copy cached
//! before the lock was taken may predate another invocation's write, and
//! mutating it would lose that write.

use thiserror::Error;
use tracing::{debug, info};

use super::model::{EnqueueOutcome, Queue, QueueEntry};
use crate::lock::{AdvisoryLock, LockConfig, LockError, LockName, LockTimeout};
use crate::store::{KeyValueStore, StoreError, get_json, set_json};

/// Store key holding the queue array.
pub const QUEUE_KEY: &str = "queue";

/// System-level failures of a queue operation.
///
/// Business-rule outcomes (duplicates, not found, empty) are reported in
/// the `Ok` value instead.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Another invocation holds the lock; the operation was abandoned.
    #[error("queue is busy: {0}")]
    Busy(#[from] LockTimeout),

    #[error("queue store failure: {0}")]
    Store(#[from] StoreError),
}

impl From<LockError> for QueueError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Timeout(t) => QueueError::Busy(t),
            LockError::Store(s) => QueueError::Store(s),
        }
    }
}

impl QueueError {
    pub fn is_busy(&self) -> bool {
        matches!(self, QueueError::Busy(_))
    }
}

/// Queue operations for a single invocation.
pub struct QueueManager<'a, S> {
    store: &'a S,
    lock: AdvisoryLock<'a, S>,
    cached: Option<Queue>,
}

impl<'a, S: KeyValueStore> QueueManager<'a, S> {
    pub fn new(store: &'a S, lock_config: LockConfig) -> Self {
        Self {
            store,
            lock: AdvisoryLock::new(store, lock_config),
            cached: None,
        }
    }

    /// All entries in queue order. May be a snapshot from earlier in this
    /// invocation.
    pub async fn list(&mut self) -> Result<Vec<QueueEntry>, QueueError> {
        Ok(self.load().await?.entries().to_vec())
    }

    pub async fn size(&mut self) -> Result<usize, QueueError> {
        Ok(self.load().await?.len())
    }

    /// The user's entry and 1-based position.
    pub async fn position(&mut self, user: &str) -> Result<Option<(QueueEntry, usize)>, QueueError> {
        Ok(self
            .load()
            .await?
            .position(user)
            .map(|(entry, position)| (entry.clone(), position)))
    }

    /// Adds `user` with `profile`, subject to the uniqueness rules.
    pub async fn enqueue(
        &mut self,
        user: &str,
        profile: &str,
        priority: bool,
    ) -> Result<EnqueueOutcome, QueueError> {
        let entry = QueueEntry::new(user, profile, priority);
        let (queue, outcome) = self
            .mutate(move |queue| {
                let outcome = queue.enqueue(entry);
                let changed = matches!(outcome, EnqueueOutcome::Added { .. });
                (outcome, changed)
            })
            .await?;
        self.cached = Some(queue);

        match outcome {
            EnqueueOutcome::Added { position } => {
                info!(user, profile, priority, position, "Queue entry added");
            }
            rejected => debug!(user, profile, ?rejected, "Queue entry rejected"),
        }
        Ok(outcome)
    }

    /// Removes and returns the head, or `None` if the queue is empty.
    ///
    /// An empty queue is answered without touching the critical-section lock.
    pub async fn dequeue(&mut self) -> Result<Option<QueueEntry>, QueueError> {
        if self.load().await?.is_empty() {
            return Ok(None);
        }

        let (queue, head) = self
            .mutate(|queue| {
                let head = queue.dequeue();
                let changed = head.is_some();
                (head, changed)
            })
            .await?;
        self.cached = Some(queue);

        if let Some(entry) = &head {
            info!(user = %entry.user, profile = %entry.profile, "Queue head dequeued");
        }
        Ok(head)
    }

    /// Removes the entry whose user or profile is `identifier`.
    pub async fn remove(&mut self, identifier: &str) -> Result<Option<QueueEntry>, QueueError> {
        let (queue, removed) = self
            .mutate(|queue| {
                let removed = queue.remove(identifier);
                let changed = removed.is_some();
                (removed, changed)
            })
            .await?;
        self.cached = Some(queue);

        if let Some(entry) = &removed {
            info!(user = %entry.user, profile = %entry.profile, "Queue entry removed");
        }
        Ok(removed)
    }

    /// Removes `user`'s own entry. Unlike [`remove`](Self::remove), a
    /// profile that happens to equal `user` is not matched.
    pub async fn leave(&mut self, user: &str) -> Result<Option<QueueEntry>, QueueError> {
        let (queue, removed) = self
            .mutate(|queue| {
                let removed = queue.remove_user(user);
                let changed = removed.is_some();
                (removed, changed)
            })
            .await?;
        self.cached = Some(queue);

        if let Some(entry) = &removed {
            info!(user = %entry.user, profile = %entry.profile, "Queue entry left");
        }
        Ok(removed)
    }

    pub async fn clear(&mut self) -> Result<(), QueueError> {
        let (queue, ()) = self
            .mutate(|queue| {
                let changed = !queue.is_empty();
                queue.clear();
                ((), changed)
            })
            .await?;
        self.cached = Some(queue);
        info!("Queue cleared");
        Ok(())
    }

    /// Loads the queue once per invocation under the read-prepare lock.
    async fn load(&mut self) -> Result<&Queue, QueueError> {
        if self.cached.is_none() {
            let store = self.store;
            let queue = self
                .lock
                .with_lock(LockName::QueueRead, || async move {
                    read_queue(store).await.map_err(QueueError::from)
                })
                .await?;
            debug!(len = queue.len(), "Queue loaded");
            self.cached = Some(queue);
        }
        Ok(self.cached.get_or_insert_with(Queue::new))
    }

    /// Applies `op` to the current stored queue under the critical lock.
    ///
    /// `op` returns its result and whether it changed the queue; unchanged
    /// queues are not written back.
    async fn mutate<T, F>(&self, op: F) -> Result<(Queue, T), QueueError>
    where
        F: FnOnce(&mut Queue) -> (T, bool),
    {
        let store = self.store;
        self.lock
            .with_lock(LockName::QueueCritical, || async move {
                let mut queue = read_queue(store).await?;
                let (result, changed) = op(&mut queue);
                if changed {
                    set_json(store, QUEUE_KEY, &queue).await?;
                }
                Ok((queue, result))
            })
            .await
    }
}

/// Reads the stored queue without locking. An absent key is an empty queue; a failed read
/// is an error, never an empty queue.
pub async fn read_queue<S: KeyValueStore>(store: &S) -> Result<Queue, StoreError> {
    Ok(get_json(store, QUEUE_KEY).await?.unwrap_or_default())
}
