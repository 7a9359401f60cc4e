//! reqwest-based Helix client scoped to one broadcaster.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::error::HelixError;
use crate::types::UserId;
use crate::webhooks::events::SUBSCRIPTION_TYPES;

const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials and identities the bot acts with.
#[derive(Clone)]
pub struct HelixCredentials {
    pub client_id: String,
    pub access_token: String,
    /// Channel whose chat the bot serves.
    pub broadcaster_id: UserId,
    /// Account the bot posts as.
    pub bot_user_id: UserId,
}

impl std::fmt::Debug for HelixCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixCredentials")
            .field("client_id", &self.client_id)
            .field("broadcaster_id", &self.broadcaster_id)
            .field("bot_user_id", &self.bot_user_id)
            .finish_non_exhaustive()
    }
}

/// A Helix API client for one broadcaster's channel.
#[derive(Debug, Clone)]
pub struct HelixClient {
    http: reqwest::Client,
    api_base: String,
    broadcaster_id: UserId,
    bot_user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    data: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    is_sent: bool,
    #[serde(default)]
    drop_reason: Option<Value>,
}

impl HelixClient {
    pub fn new(credentials: HelixCredentials) -> Result<Self, HelixError> {
        Self::with_api_base(credentials, DEFAULT_API_BASE)
    }

    /// Creates a client against a different API root (for mock servers).
    pub fn with_api_base(
        credentials: HelixCredentials,
        api_base: impl Into<String>,
    ) -> Result<Self, HelixError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", credentials.access_token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| HelixError::invalid("access token is not a valid header value"))?,
        );
        headers.insert(
            "client-id",
            HeaderValue::from_str(credentials.client_id.trim())
                .map_err(|_| HelixError::invalid("client id is not a valid header value"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HelixError::transport("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            broadcaster_id: credentials.broadcaster_id,
            bot_user_id: credentials.bot_user_id,
        })
    }

    /// Posts `text` to the broadcaster's chat as the bot.
    pub async fn send_chat_message(&self, text: &str) -> Result<(), HelixError> {
        let response = self
            .http
            .post(format!("{}/chat/messages", self.api_base))
            .json(&chat_message_body(&self.broadcaster_id, &self.bot_user_id, text))
            .send()
            .await
            .map_err(|e| HelixError::transport("send chat message", e))?;
        let body: SendMessageResponse = check(response).await?.json().await.map_err(|e| {
            HelixError::transport("decode send chat message response", e)
        })?;

        match body.data.first() {
            Some(sent) if sent.is_sent => {
                debug!(text, "Chat message sent");
                Ok(())
            }
            Some(sent) => Err(HelixError::invalid(format!(
                "chat message dropped: {}",
                sent.drop_reason.clone().unwrap_or(Value::Null)
            ))),
            None => Err(HelixError::invalid("empty send chat message response")),
        }
    }

    /// Number of EventSub subscriptions owned by this client.
    pub async fn subscription_count(&self) -> Result<u64, HelixError> {
        let response = self
            .http
            .get(format!("{}/eventsub/subscriptions", self.api_base))
            .send()
            .await
            .map_err(|e| HelixError::transport("list subscriptions", e))?;
        let list: SubscriptionList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| HelixError::transport("decode subscription list", e))?;
        Ok(list.total)
    }

    /// Creates a webhook subscription of `kind` delivering to `callback`.
    pub async fn subscribe(&self, kind: &str, callback: &str, secret: &str) -> Result<(), HelixError> {
        let response = self
            .http
            .post(format!("{}/eventsub/subscriptions", self.api_base))
            .json(&subscription_body(
                kind,
                &self.broadcaster_id,
                &self.bot_user_id,
                callback,
                secret,
            ))
            .send()
            .await
            .map_err(|e| HelixError::transport("create subscription", e))?;
        check(response).await?;
        info!(kind, "EventSub subscription created");
        Ok(())
    }

    /// Subscribes to every type in [`SUBSCRIPTION_TYPES`] if no
    /// subscriptions exist yet. Returns how many were created.
    ///
    /// Individual failures are logged and skipped.
    pub async fn ensure_subscriptions(&self, callback: &str, secret: &str) -> Result<usize, HelixError> {
        let existing = self.subscription_count().await?;
        if existing > 0 {
            debug!(existing, "EventSub subscriptions already present");
            return Ok(0);
        }

        let mut created = 0;
        for kind in SUBSCRIPTION_TYPES {
            match self.subscribe(kind, callback, secret).await {
                Ok(()) => created += 1,
                Err(e) => warn!(kind, error = %e, "Failed to create EventSub subscription"),
            }
        }
        Ok(created)
    }
}

/// Turns a non-success response into an error carrying the body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, HelixError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(HelixError::from_status(status.as_u16(), message))
}

fn chat_message_body(broadcaster: &UserId, sender: &UserId, text: &str) -> Value {
    json!({
        "broadcaster_id": broadcaster,
        "sender_id": sender,
        "message": text,
    })
}

fn subscription_body(
    kind: &str,
    broadcaster: &UserId,
    bot: &UserId,
    callback: &str,
    secret: &str,
) -> Value {
    // Chat subscriptions are read as a specific user; shared-chat ones are not.
    let condition = if kind.starts_with("channel.chat.") {
        json!({ "broadcaster_user_id": broadcaster, "user_id": bot })
    } else {
        json!({ "broadcaster_user_id": broadcaster })
    };
    json!({
        "type": kind,
        "version": "1",
        "condition": condition,
        "transport": {
            "method": "webhook",
            "callback": callback,
            "secret": secret,
        },
    })
}
