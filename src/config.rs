//! Service configuration from environment variables.
//!
//! | variable | default |
//! |----------|---------|
//! | `EVENTSUB_SECRET` | required |
//! | `BIND_ADDR` | `0.0.0.0:8787` |
//! | `STORE_URL`, `STORE_AUTH` | in-process store |
//! | `TWITCH_CLIENT_ID`, `TWITCH_BOT_TOKEN`, `TWITCH_BROADCASTER_ID`, `TWITCH_BOT_USER_ID` | replies are logged only |
//! | `EVENTSUB_CALLBACK_URL` | subscriptions are not managed |
//! | `QUEUE_LOCK_ATTEMPTS` | 4 |
//! | `QUEUE_LOCK_BACKOFF_MS` | 250 |
//! | `QUEUE_LOCK_SETTLE_MS` | 100 |
//! | `MESSAGE_MAX_AGE_SECS` | 600 |
//!
//! Empty values count as unset.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::helix::HelixCredentials;
use crate::lock::LockConfig;
use crate::types::UserId;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_MESSAGE_MAX_AGE_SECS: u64 = 600;

const TWITCH_VARS: [&str; 4] = [
    "TWITCH_CLIENT_ID",
    "TWITCH_BOT_TOKEN",
    "TWITCH_BROADCASTER_ID",
    "TWITCH_BOT_USER_ID",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Some but not all platform credentials were given.
    #[error("platform credentials incomplete: {0} is not set")]
    IncompleteCredentials(&'static str),
}

/// Where the remote key/value store lives.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub auth: Option<String>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    /// HMAC key shared with the platform for webhook signatures.
    pub eventsub_secret: String,
    pub bind_addr: SocketAddr,
    /// `None` runs against an in-process store.
    pub store: Option<StoreConfig>,
    /// `None` logs replies instead of sending them.
    pub helix: Option<HelixCredentials>,
    /// Public URL of `POST /callback`, used when creating subscriptions.
    pub callback_url: Option<String>,
    pub lock: LockConfig,
    /// Deliveries whose timestamp is further than this from now are refused.
    pub message_max_age: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("store", &self.store)
            .field("helix", &self.helix)
            .field("callback_url", &self.callback_url)
            .field("lock", &self.lock)
            .field("message_max_age", &self.message_max_age)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let eventsub_secret = get("EVENTSUB_SECRET").ok_or(ConfigError::Missing("EVENTSUB_SECRET"))?;

        let bind_addr = parse_or("BIND_ADDR", get("BIND_ADDR"), || {
            SocketAddr::from(([0, 0, 0, 0], 8787))
        })?;

        let store = get("STORE_URL").map(|url| StoreConfig {
            url,
            auth: get("STORE_AUTH"),
        });

        let values: Vec<Option<String>> = TWITCH_VARS.iter().map(|var| get(*var)).collect();
        let helix = match values.as_slice() {
            [Some(client_id), Some(token), Some(broadcaster), Some(bot)] => Some(HelixCredentials {
                client_id: client_id.clone(),
                access_token: token.clone(),
                broadcaster_id: UserId::new(broadcaster.clone()),
                bot_user_id: UserId::new(bot.clone()),
            }),
            _ if values.iter().all(Option::is_none) => None,
            _ => {
                let missing = TWITCH_VARS
                    .iter()
                    .zip(&values)
                    .find_map(|(var, value)| value.is_none().then_some(*var))
                    .unwrap_or(TWITCH_VARS[0]);
                return Err(ConfigError::IncompleteCredentials(missing));
            }
        };

        let attempts: u32 = parse_or("QUEUE_LOCK_ATTEMPTS", get("QUEUE_LOCK_ATTEMPTS"), || {
            LockConfig::DEFAULT.max_attempts
        })?;
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "QUEUE_LOCK_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        let backoff_ms: u64 = parse_or("QUEUE_LOCK_BACKOFF_MS", get("QUEUE_LOCK_BACKOFF_MS"), || {
            LockConfig::DEFAULT.backoff.as_millis() as u64
        })?;
        let settle_ms: u64 = parse_or("QUEUE_LOCK_SETTLE_MS", get("QUEUE_LOCK_SETTLE_MS"), || {
            LockConfig::DEFAULT.settle.as_millis() as u64
        })?;
        let max_age_secs: u64 = parse_or("MESSAGE_MAX_AGE_SECS", get("MESSAGE_MAX_AGE_SECS"), || {
            DEFAULT_MESSAGE_MAX_AGE_SECS
        })?;

        Ok(Config {
            eventsub_secret,
            bind_addr,
            store,
            helix,
            callback_url: get("EVENTSUB_CALLBACK_URL"),
            lock: LockConfig::new(attempts, Duration::from_millis(backoff_ms))
                .with_settle(Duration::from_millis(settle_ms)),
            message_max_age: Duration::from_secs(max_age_secs),
        })
    }
}

fn parse_or<T, D>(var: &'static str, value: Option<String>, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    D: FnOnce() -> T,
{
    match value {
        None => Ok(default()),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}
