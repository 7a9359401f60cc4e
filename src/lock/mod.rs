//! Cooperative mutual exclusion over the key/value store.
//!
//! The store has no compare-and-swap, so exclusion is advisory: every
//! mutator reads a boolean flag, and only if it is `false` writes `true` and
//! proceeds. A held flag is re-checked after a real backoff sleep, up to a
//! bounded number of attempts. Exceeding the budget yields [`LockTimeout`];
//! callers abandon the mutation rather than proceed unguarded.
//!
//! Two invocations can both read `false` before either write lands. To
//! narrow that window each claimant also writes a unique owner token next
//! to the flag, waits `settle`, and reads the token back. Only the claimant
//! whose token survived proceeds; the others count the attempt as busy.
//! Claims whose writes land more than `settle` apart can still collide.
//!
//! The store offers no lease or expiry. A holder that dies without releasing
//! leaves the flag `true` and blocks every later mutator until the flag is
//! reset by hand. [`AdvisoryLock::with_lock`] releases on every return path
//! of the guarded section, including errors.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::store::{KeyValueStore, StoreError, get_json, set_json};

/// The named locks. Each has its own independent flag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockName {
    /// Coarse lock held while loading the queue into memory.
    QueueRead,
    /// Lock held for any change to queue membership.
    QueueCritical,
    /// Lock held for read-modify-write of the per-voter vote map.
    Votes,
    /// Lock held while recording a delivery's message ID.
    Deliveries,
}

impl LockName {
    /// The store key holding this lock's flag.
    pub fn key(self) -> &'static str {
        match self {
            LockName::QueueRead => "queue_read_lock",
            LockName::QueueCritical => "queue_critical_lock",
            LockName::Votes => "votes_lock",
            LockName::Deliveries => "deliveries_lock",
        }
    }

    /// The store key holding the token of the latest claimant.
    pub fn owner_key(self) -> &'static str {
        match self {
            LockName::QueueRead => "queue_read_lock_owner",
            LockName::QueueCritical => "queue_critical_lock_owner",
            LockName::Votes => "votes_lock_owner",
            LockName::Deliveries => "deliveries_lock_owner",
        }
    }
}

static NEXT_CLAIM: AtomicU64 = AtomicU64::new(0);

/// A token unique to one acquisition attempt, across processes sharing the
/// store.
fn claim_token() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = NEXT_CLAIM.fetch_add(1, Ordering::Relaxed);
    format!("{}-{nanos}-{seq}", std::process::id())
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Retry budget for acquiring a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Total number of flag checks, including the first.
    pub max_attempts: u32,

    /// Sleep between consecutive checks.
    pub backoff: Duration,

    /// Wait between writing an owner token and reading it back.
    pub settle: Duration,
}

impl LockConfig {
    /// Four attempts, 250ms apart: at most 750ms spent backing off.
    pub const DEFAULT: Self = Self {
        max_attempts: 4,
        backoff: Duration::from_millis(250),
        settle: Duration::from_millis(100),
    };

    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            settle: Self::DEFAULT.settle,
        }
    }

    pub fn with_settle(self, settle: Duration) -> Self {
        Self { settle, ..self }
    }

    /// Upper bound on time spent backing off before giving up.
    pub fn total_max_wait(&self) -> Duration {
        self.backoff * self.max_attempts.saturating_sub(1)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The lock was still held after the whole retry budget was spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lock '{lock}' still held after {attempts} attempts")]
pub struct LockTimeout {
    pub lock: LockName,
    pub attempts: u32,
}

/// Failure to acquire or release a lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Timeout(#[from] LockTimeout),

    #[error("lock flag access failed: {0}")]
    Store(#[from] StoreError),
}

/// Proof that a lock flag was set by this invocation.
///
/// Must be handed back to [`AdvisoryLock::release`].
#[must_use = "a held lock must be released"]
#[derive(Debug, PartialEq, Eq)]
pub struct HeldLock {
    name: LockName,
}

impl HeldLock {
    pub fn name(&self) -> LockName {
        self.name
    }
}

/// Acquires and releases named advisory locks against a store.
#[derive(Debug)]
pub struct AdvisoryLock<'a, S> {
    store: &'a S,
    config: LockConfig,
}

impl<S> Clone for AdvisoryLock<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for AdvisoryLock<'_, S> {}

impl<'a, S: KeyValueStore> AdvisoryLock<'a, S> {
    pub fn new(store: &'a S, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> LockConfig {
        self.config
    }

    /// Acquires `name`, sleeping `config.backoff` between checks.
    ///
    /// Store failures abort immediately; they are not retried.
    pub async fn acquire(&self, name: LockName) -> Result<HeldLock, LockError> {
        let key = name.key();
        for attempt in 1..=self.config.max_attempts {
            let held: bool = get_json(self.store, key).await?.unwrap_or(false);
            if !held {
                if self.claim(name).await? {
                    debug!(lock = key, attempt, "Lock acquired");
                    return Ok(HeldLock { name });
                }
                debug!(lock = key, attempt, "Lost lock claim to another invocation");
            }

            if attempt < self.config.max_attempts {
                debug!(
                    lock = key,
                    attempt,
                    backoff_ms = self.config.backoff.as_millis() as u64,
                    "Lock busy, backing off"
                );
                tokio::time::sleep(self.config.backoff).await;
            }
        }

        warn!(
            lock = key,
            attempts = self.config.max_attempts,
            "Lock acquisition timed out"
        );
        Err(LockTimeout {
            lock: name,
            attempts: self.config.max_attempts,
        }
        .into())
    }

    /// Sets the flag and owner token, then checks the token is still ours
    /// once concurrent claims have had `settle` to land.
    async fn claim(&self, name: LockName) -> Result<bool, StoreError> {
        let token = claim_token();
        set_json(self.store, name.owner_key(), &token).await?;
        set_json(self.store, name.key(), &true).await?;
        tokio::time::sleep(self.config.settle).await;

        let owner: Option<String> = get_json(self.store, name.owner_key()).await?;
        Ok(owner.as_deref() == Some(token.as_str()))
    }

    /// Resets the flag to `false`.
    pub async fn release(&self, held: HeldLock) -> Result<(), StoreError> {
        set_json(self.store, held.name.key(), &false).await?;
        debug!(lock = held.name.key(), "Lock released");
        Ok(())
    }

    /// Runs `section` while holding `name`.
    ///
    /// The lock is released whether `section` succeeds or fails. If the
    /// section failed, its error is returned even when the release also
    /// failed; a failed release after a successful section is an error.
    pub async fn with_lock<T, E, F, Fut>(&self, name: LockName, section: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let held = self.acquire(name).await?;
        let outcome = section().await;
        let released = self.release(held).await;

        match (outcome, released) {
            (outcome, Ok(())) => outcome,
            (Err(e), Err(release_err)) => {
                error!(lock = name.key(), error = %release_err, "Failed to release lock after error");
                Err(e)
            }
            (Ok(_), Err(release_err)) => {
                error!(lock = name.key(), error = %release_err, "Failed to release lock");
                Err(LockError::Store(release_err).into())
            }
        }
    }
}
