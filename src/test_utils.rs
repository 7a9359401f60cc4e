//! Shared test fixtures: recording seams and signed deliveries.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::chat::ChatSink;
use crate::helix::HelixError;
use crate::store::{KeyValueStore, MemoryStore, StoreError};
use crate::types::UserId;
use crate::vote::Alarm;
use crate::webhooks::headers::{
    MESSAGE_ID, MESSAGE_SIGNATURE, MESSAGE_TIMESTAMP, MESSAGE_TYPE, SUBSCRIPTION_TYPE,
};
use crate::webhooks::{Badge, ChatMessageEvent, compute_signature, format_signature_header};

/// Chat sink that keeps every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl ChatSink for RecordingSink {
    async fn send_message(&self, text: &str) -> Result<(), HelixError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Alarm that records schedules without ever firing.
#[derive(Debug, Default)]
pub struct RecordingAlarm {
    scheduled: Mutex<Vec<(Duration, DateTime<Utc>)>>,
}

impl RecordingAlarm {
    pub fn scheduled(&self) -> Vec<(Duration, DateTime<Utc>)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl Alarm for RecordingAlarm {
    fn schedule(&self, after: Duration, deadline: DateTime<Utc>) {
        self.scheduled.lock().unwrap().push((after, deadline));
    }
}

/// Store that waits before every access, so concurrent invocations
/// genuinely interleave between a read and the write that follows it.
#[derive(Debug, Clone, Default)]
pub struct LaggyStore {
    inner: MemoryStore,
    latency: Duration,
    slow_write: Option<(&'static str, Duration)>,
}

impl LaggyStore {
    pub fn new(inner: MemoryStore, latency: Duration) -> Self {
        LaggyStore {
            inner,
            latency,
            slow_write: None,
        }
    }

    /// Writes to `key` take `delay` instead of the usual latency.
    pub fn with_slow_write(mut self, key: &'static str, delay: Duration) -> Self {
        self.slow_write = Some((key, delay));
        self
    }

    pub async fn peek(&self, key: &str) -> Option<Value> {
        self.inner.peek(key).await
    }
}

impl KeyValueStore for LaggyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        tokio::time::sleep(self.latency).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let delay = match self.slow_write {
            Some((slow, delay)) if slow == key => delay,
            _ => self.latency,
        };
        tokio::time::sleep(delay).await;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.latency).await;
        self.inner.delete(key).await
    }
}

/// A chat message from `login` wearing `badges`.
pub fn chat_event(login: &str, badges: &[&str], text: &str) -> ChatMessageEvent {
    ChatMessageEvent {
        broadcaster_user_id: UserId::new("428214501"),
        chatter_user_id: UserId::new(format!("id-{login}")),
        chatter_user_login: login.to_string(),
        chatter_user_name: login.to_string(),
        message_id: format!("msg-{login}"),
        text: text.to_string(),
        badges: badges.iter().map(|b| Badge::new(*b)).collect(),
    }
}

/// The wire body of a `channel.chat.message` notification.
pub fn chat_notification_body(login: &str, badges: &[&str], text: &str) -> Vec<u8> {
    let badges: Vec<Value> = badges
        .iter()
        .map(|b| json!({"set_id": b, "id": "1", "info": ""}))
        .collect();
    serde_json::to_vec(&json!({
        "subscription": {
            "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
            "type": "channel.chat.message",
            "version": "1",
            "status": "enabled",
        },
        "event": {
            "broadcaster_user_id": "428214501",
            "broadcaster_user_login": "broadcaster",
            "broadcaster_user_name": "Broadcaster",
            "chatter_user_id": format!("id-{login}"),
            "chatter_user_login": login,
            "chatter_user_name": login,
            "message_id": format!("msg-{login}"),
            "message": {"text": text, "fragments": []},
            "badges": badges,
        }
    }))
    .unwrap()
}

static NEXT_MESSAGE: AtomicU64 = AtomicU64::new(0);

/// Headers for a delivery signed with `secret` and sent at `sent_at`, under
/// a message ID no other call returns.
pub fn signed_headers(
    secret: &[u8],
    message_type: &str,
    subscription_type: Option<&str>,
    body: &[u8],
    sent_at: DateTime<Utc>,
) -> HeaderMap {
    let id = format!(
        "e76c6bd4-55c9-4987-8304-{:012x}",
        NEXT_MESSAGE.fetch_add(1, Ordering::Relaxed)
    );
    signed_headers_with_id(secret, &id, message_type, subscription_type, body, sent_at)
}

/// Like [`signed_headers`], reusing `id` as a redelivery would.
pub fn signed_headers_with_id(
    secret: &[u8],
    id: &str,
    message_type: &str,
    subscription_type: Option<&str>,
    body: &[u8],
    sent_at: DateTime<Utc>,
) -> HeaderMap {
    let timestamp = sent_at.to_rfc3339();
    let signature = format_signature_header(&compute_signature(id, &timestamp, body, secret));

    let mut headers = HeaderMap::new();
    headers.insert(MESSAGE_ID, id.parse().unwrap());
    headers.insert(MESSAGE_TIMESTAMP, timestamp.parse().unwrap());
    headers.insert(MESSAGE_SIGNATURE, signature.parse().unwrap());
    headers.insert(MESSAGE_TYPE, message_type.parse().unwrap());
    if let Some(sub) = subscription_type {
        headers.insert(SUBSCRIPTION_TYPE, sub.parse().unwrap());
    }
    headers
}
