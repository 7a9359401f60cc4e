//! HTTP server.
//!
//! # Endpoints
//!
//! - `POST /callback` - EventSub webhook receiver
//! - `GET /queue` - the sign-up queue as JSON
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};

use crate::chat::ChatSink;
use crate::config::Config;
use crate::lock::LockConfig;
use crate::store::KeyValueStore;
use crate::types::UserId;
use crate::vote::ChannelAlarm;
use crate::webhooks::NotificationRouter;

pub mod health;
pub mod queue;
pub mod webhook;

pub use health::health_handler;
pub use queue::queue_handler;
pub use webhook::webhook_handler;

/// Shared application state, passed to handlers via axum's `State`
/// extractor.
pub struct AppState<S, C> {
    inner: Arc<AppStateInner<S, C>>,
}

impl<S, C> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S, C> {
    router: NotificationRouter,
    store: Arc<S>,
    chat: Arc<C>,
    alarm: ChannelAlarm,
    lock_config: LockConfig,
    delivery_retention: Duration,
    bot_user_id: Option<UserId>,
}

impl<S, C> AppState<S, C> {
    pub fn new(config: &Config, store: Arc<S>, chat: Arc<C>, alarm: ChannelAlarm) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                router: NotificationRouter::new(
                    config.eventsub_secret.as_bytes(),
                    config.message_max_age,
                ),
                store,
                chat,
                alarm,
                lock_config: config.lock,
                delivery_retention: config.message_max_age,
                bot_user_id: config.helix.as_ref().map(|h| h.bot_user_id.clone()),
            }),
        }
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.inner.router
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn chat(&self) -> &C {
        &self.inner.chat
    }

    pub fn alarm(&self) -> &ChannelAlarm {
        &self.inner.alarm
    }

    pub fn lock_config(&self) -> LockConfig {
        self.inner.lock_config
    }

    /// How long a delivery's message ID is remembered.
    pub fn delivery_retention(&self) -> Duration {
        self.inner.delivery_retention
    }

    /// The bot's own account, whose chat messages are not dispatched.
    pub fn bot_user_id(&self) -> Option<&UserId> {
        self.inner.bot_user_id.as_ref()
    }
}

/// Builds the axum Router with all endpoints. Unknown paths answer 404.
pub fn build_router<S, C>(app_state: AppState<S, C>) -> Router
where
    S: KeyValueStore + 'static,
    C: ChatSink + 'static,
{
    Router::new()
        .route("/callback", post(webhook_handler::<S, C>))
        .route("/queue", get(queue_handler::<S, C>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::queue::QUEUE_KEY;
    use crate::store::MemoryStore;
    use crate::test_utils::{
        LaggyStore, RecordingSink, chat_notification_body, signed_headers, signed_headers_with_id,
    };
    use crate::vote::AlarmFired;
    use crate::webhooks::headers::MESSAGE_SIGNATURE;

    const SECRET: &[u8] = b"eventsub-test-secret";

    struct TestApp {
        state: AppState<MemoryStore, RecordingSink>,
        store: Arc<MemoryStore>,
        chat: Arc<RecordingSink>,
        _alarms: mpsc::Receiver<AlarmFired>,
    }

    fn test_app() -> TestApp {
        let config = Config::from_lookup(|var| {
            (var == "EVENTSUB_SECRET").then(|| String::from_utf8_lossy(SECRET).into_owned())
        })
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let chat = Arc::new(RecordingSink::default());
        let (alarm, alarms) = ChannelAlarm::channel(4);
        TestApp {
            state: AppState::new(&config, store.clone(), chat.clone(), alarm),
            store,
            chat,
            _alarms: alarms,
        }
    }

    fn delivery(message_type: &str, subscription_type: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let headers = signed_headers(SECRET, message_type, subscription_type, &body, Utc::now());
        let mut request = Request::builder()
            .method("POST")
            .uri("/callback")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        request.headers_mut().extend(headers);
        request
    }

    fn chat(login: &str, badges: &[&str], text: &str) -> Request<Body> {
        delivery(
            "notification",
            Some("channel.chat.message"),
            chat_notification_body(login, badges, text),
        )
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    // ─── Health and routing ───

    #[tokio::test]
    async fn health_returns_200() {
        let app = build_router(test_app().state);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let app = build_router(test_app().state);
        let request = Request::builder().uri("/refresh").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ─── Callback endpoint ───

    #[tokio::test]
    async fn verification_echoes_challenge_as_text() {
        let app = build_router(test_app().state);
        let body = serde_json::to_vec(&json!({
            "challenge": "pogchamp-kappa-360noscope-vohiyo",
            "subscription": {"type": "channel.chat.message", "version": "1"}
        }))
        .unwrap();

        let response = app
            .oneshot(delivery("webhook_callback_verification", None, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_bytes(response).await, b"pogchamp-kappa-360noscope-vohiyo");
    }

    #[tokio::test]
    async fn chat_command_is_dispatched() {
        let t = test_app();
        let app = build_router(t.state.clone());

        let response = app.oneshot(chat("alice", &[], "!join magnus")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_bytes(response).await.is_empty());
        assert_eq!(
            t.store.peek(QUEUE_KEY).await,
            Some(json!([{"user": "alice", "profile": "magnus", "priority": false}]))
        );
        assert_eq!(t.chat.sent().len(), 1);
    }

    #[tokio::test]
    async fn tampered_signature_is_403_and_not_dispatched() {
        let t = test_app();
        let app = build_router(t.state.clone());
        let mut request = chat("alice", &[], "!join magnus");
        request
            .headers_mut()
            .insert(MESSAGE_SIGNATURE, format!("sha256={}", "0".repeat(64)).parse().unwrap());

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(t.store.peek(QUEUE_KEY).await, None);
        assert!(t.chat.sent().is_empty());
    }

    #[tokio::test]
    async fn stale_delivery_is_403() {
        let app = build_router(test_app().state);
        let body = chat_notification_body("alice", &[], "!size");
        let sent_at = Utc::now() - chrono::Duration::minutes(30);
        let headers = signed_headers(SECRET, "notification", Some("channel.chat.message"), &body, sent_at);
        let mut request = Request::builder()
            .method("POST")
            .uri("/callback")
            .body(Body::from(body))
            .unwrap();
        request.headers_mut().extend(headers);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_message_type_is_403() {
        let app = build_router(test_app().state);
        let response = app
            .oneshot(delivery("mystery", None, b"{}".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_notification_is_400() {
        let app = build_router(test_app().state);
        let response = app
            .oneshot(delivery("notification", Some("channel.chat.message"), b"not json".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn revocation_and_other_types_are_204() {
        let app = build_router(test_app().state);
        let body = serde_json::to_vec(&json!({
            "subscription": {"type": "channel.chat.message", "status": "user_removed"}
        }))
        .unwrap();
        let response = app
            .clone()
            .oneshot(delivery("revocation", Some("channel.chat.message"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let body = serde_json::to_vec(&json!({
            "subscription": {"type": "channel.shared_chat.begin"},
            "event": {}
        }))
        .unwrap();
        let response = app
            .oneshot(delivery("notification", Some("channel.shared_chat.begin"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn dispatch_failure_still_acknowledges() {
        let t = test_app();
        t.store.fail_reads(true);
        let app = build_router(t.state.clone());

        let response = app.oneshot(chat("alice", &[], "!join magnus")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(t.chat.sent().is_empty());
    }

    // ─── Queue view ───

    #[tokio::test]
    async fn queue_view_lists_entries_in_order() {
        let t = test_app();
        let app = build_router(t.state.clone());
        app.clone().oneshot(chat("alice", &[], "!join a")).await.unwrap();
        app.clone().oneshot(chat("bob", &["founder"], "!join b")).await.unwrap();

        let request = Request::builder().uri("/queue").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let listed: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(
            listed,
            json!([
                {"user": "bob", "profile": "b", "priority": true},
                {"user": "alice", "profile": "a", "priority": false}
            ])
        );
    }

    #[tokio::test]
    async fn queue_view_reports_store_failure() {
        let t = test_app();
        t.store.fail_reads(true);
        let app = build_router(t.state.clone());

        let request = Request::builder().uri("/queue").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivered_notification_runs_once() {
        let app = test_app();
        let router = build_router(app.state.clone());
        let body = chat_notification_body("viewer", &[], "!join p1");

        for _ in 0..2 {
            let headers = signed_headers_with_id(
                SECRET,
                "b2f1e0c3-redelivered",
                "notification",
                Some("channel.chat.message"),
                &body,
                Utc::now(),
            );
            let mut request = Request::builder()
                .method("POST")
                .uri("/callback")
                .body(Body::from(body.clone()))
                .unwrap();
            request.headers_mut().extend(headers);

            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        assert_eq!(
            app.chat.sent(),
            ["@viewer joined the queue as p1 at position 1."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_request_still_finishes_command_and_releases_lock() {
        let config = Config::from_lookup(|var| {
            (var == "EVENTSUB_SECRET").then(|| String::from_utf8_lossy(SECRET).into_owned())
        })
        .unwrap();
        let memory = MemoryStore::new();
        let store = Arc::new(
            LaggyStore::new(memory.clone(), Duration::ZERO)
                .with_slow_write(QUEUE_KEY, Duration::from_secs(15)),
        );
        let chat_sink = Arc::new(RecordingSink::default());
        let (alarm, _alarms) = ChannelAlarm::channel(4);
        let app = build_router(AppState::new(&config, store, chat_sink.clone(), alarm));

        // The caller gives up while the queue write is still in flight.
        let abandoned = tokio::time::timeout(
            Duration::from_secs(10),
            app.clone().oneshot(chat("viewer", &[], "!join p1")),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(memory.peek("queue_critical_lock").await, Some(json!(false)));
        assert_eq!(
            chat_sink.sent(),
            ["@viewer joined the queue as p1 at position 1."]
        );

        let response = app.oneshot(chat("other", &[], "!join p2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            memory.peek(QUEUE_KEY).await,
            Some(json!([
                {"user": "viewer", "profile": "p1", "priority": false},
                {"user": "other", "profile": "p2", "priority": false}
            ]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn vote_start_schedules_real_alarm() {
        let config = Config::from_lookup(|var| {
            (var == "EVENTSUB_SECRET").then(|| String::from_utf8_lossy(SECRET).into_owned())
        })
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let chat_sink = Arc::new(RecordingSink::default());
        let (alarm, mut alarms) = ChannelAlarm::channel(4);
        let app = build_router(AppState::new(&config, store, chat_sink, alarm));

        let response = app
            .oneshot(chat("mod", &["moderator"], "!vote start 10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let start = tokio::time::Instant::now();
        let fired = alarms.recv().await.unwrap();
        assert!(fired.deadline > Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
