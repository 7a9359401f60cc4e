//! Firebase-style JSON REST backend.
//!
//! Keys map to `{base_url}/{key}.json`. Reads are `GET`, writes are `PUT`
//! with the JSON value as the body, removals are `DELETE`. An `auth` query
//! parameter is appended when a token is configured.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::{KeyValueStore, StoreError};

/// Request timeout for store calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`KeyValueStore`] backed by a remote JSON REST database.
#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl RestStore {
    /// Creates a store client for `base_url`, optionally authenticated.
    pub fn new(base_url: impl Into<String>, auth: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/{}.json", self.base_url, key)
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.key_url(key));
        match &self.auth {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn send(
        &self,
        key: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let response = builder.send().await.map_err(|source| StoreError::Transport {
            key: key.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl KeyValueStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        debug!(key, "store get");
        let response = self
            .send(key, self.request(reqwest::Method::GET, key))
            .await?;
        let value: Value = response.json().await.map_err(|source| StoreError::Transport {
            key: key.to_string(),
            source,
        })?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(key, "store set");
        self.send(key, self.request(reqwest::Method::PUT, key).json(&value))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(key, "store delete");
        self.send(key, self.request(reqwest::Method::DELETE, key))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
