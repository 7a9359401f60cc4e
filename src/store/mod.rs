//! Remote key/value store access.
//!
//! The queue, the lock flags, and the vote records all live in a JSON
//! key/value store shared by every webhook invocation. The store offers
//! whole-value `get`/`set`/`delete` and nothing else: there is no
//! compare-and-swap and no multi-key transaction, which is why the
//! [`crate::lock`] module exists.
//!
//! Two backends are provided:
//! - [`RestStore`] talks to a Firebase-style JSON REST endpoint.
//! - [`MemoryStore`] keeps values in process, for tests and local runs.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Errors talking to the store.
///
/// All of these are fatal for the operation in progress. Callers must not
/// substitute a default value for a failed read.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("store request for '{key}' failed: {source}")]
    Transport {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success status.
    #[error("store returned HTTP {status} for '{key}'")]
    Status { key: String, status: u16 },

    /// The stored value does not have the expected shape.
    #[error("value under '{key}' could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for writing.
    #[error("value for '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store is unreachable for some other reason.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous whole-value access to a JSON key/value store.
///
/// A missing key and a key holding JSON `null` are both reported as `None`.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Reads and decodes the value under `key`.
pub async fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
    }
}

/// Encodes `value` and writes it under `key`.
pub async fn set_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KeyValueStore,
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value).await
}
