//! Redelivery suppression.
//!
//! The platform retries a notification it believes was not acknowledged,
//! reusing its message ID. Seen IDs are kept in the store with the time
//! they were first accepted, so a retried `!next` is not run twice even
//! when it lands on another instance.
//!
//! Entries older than the replay window are pruned on every check: a
//! redelivery that old is rejected as stale before it gets here.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::lock::{AdvisoryLock, LockConfig, LockError, LockName};
use crate::store::{KeyValueStore, get_json, set_json};
use crate::types::MessageId;

/// Store key of the `message id -> first seen` map.
pub const SEEN_DELIVERIES_KEY: &str = "seen_deliveries";

type SeenDeliveries = BTreeMap<String, DateTime<Utc>>;

/// Remembers which deliveries have already been accepted.
pub struct DeliveryLog<'a, S> {
    store: &'a S,
    lock: AdvisoryLock<'a, S>,
    retention: Duration,
}

impl<'a, S: KeyValueStore> DeliveryLog<'a, S> {
    pub fn new(store: &'a S, lock_config: LockConfig, retention: Duration) -> Self {
        Self {
            store,
            lock: AdvisoryLock::new(store, lock_config),
            retention,
        }
    }

    /// Records `id` as seen at `now`. Returns `false` if it was already
    /// recorded within the retention period.
    pub async fn first_sighting(&self, id: &MessageId, now: DateTime<Utc>) -> Result<bool, LockError> {
        let store = self.store;
        let retention_secs = i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX);

        self.lock
            .with_lock::<_, LockError, _, _>(LockName::Deliveries, || async move {
                let mut seen: SeenDeliveries =
                    get_json(store, SEEN_DELIVERIES_KEY).await?.unwrap_or_default();
                let before = seen.len();
                seen.retain(|_, at| (now - *at).num_seconds() <= retention_secs);
                let pruned = before - seen.len();

                if seen.contains_key(id.as_str()) {
                    if pruned > 0 {
                        set_json(store, SEEN_DELIVERIES_KEY, &seen).await?;
                    }
                    return Ok(false);
                }

                seen.insert(id.as_str().to_string(), now);
                set_json(store, SEEN_DELIVERIES_KEY, &seen).await?;
                debug!(message_id = %id, pruned, "Delivery recorded");
                Ok(true)
            })
            .await
    }
}
