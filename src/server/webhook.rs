//! EventSub callback handler.
//!
//! Every delivery is authenticated before anything in its body is
//! trusted. Verified chat messages are dispatched to the command pipeline
//! before the response is sent; failures there are logged and the delivery
//! is still acknowledged, so the platform does not retry a message whose
//! command may already have run. Redeliveries that arrive anyway are
//! recognised by message ID and skipped.
//!
//! Dispatch runs on its own task. If the platform gives up on the request
//! and the connection drops, the command still finishes and releases any
//! lock it holds.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::chat::ChatSink;
use crate::commands::CommandDispatcher;
use crate::store::KeyValueStore;
use crate::types::MessageId;
use crate::webhooks::headers::{MESSAGE_ID, header_str};
use crate::webhooks::{ChatMessageEvent, DeliveryLog, Disposition, Notification, RouteError};

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            RouteError::Authentication(_) | RouteError::UnknownMessageType(_) => {
                StatusCode::FORBIDDEN
            }
            RouteError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: verification callback, body is the challenge as plain text
/// - 204 No Content: notification or revocation accepted
/// - 400 Bad Request: authenticated but undecodable body
/// - 403 Forbidden: bad signature, stale timestamp, or unknown message type
pub async fn webhook_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RouteError>
where
    S: KeyValueStore + 'static,
    C: ChatSink + 'static,
{
    let message_id = MessageId::new(header_str(&headers, MESSAGE_ID).unwrap_or("<none>"));

    let disposition = match app_state.router().route(&headers, &body, Utc::now()) {
        Ok(disposition) => disposition,
        Err(e) => {
            match &e {
                RouteError::Authentication(failure) => {
                    warn!(%message_id, reason = %failure, "Rejected unauthenticated delivery");
                }
                RouteError::UnknownMessageType(kind) => {
                    warn!(%message_id, ?kind, "Rejected delivery with unknown message type");
                }
                RouteError::MalformedPayload(parse) => {
                    warn!(%message_id, error = %parse, "Rejected malformed delivery");
                }
            }
            return Err(e);
        }
    };

    match disposition {
        Disposition::Challenge(challenge) => {
            info!(%message_id, "Answering subscription verification");
            Ok((StatusCode::OK, challenge).into_response())
        }
        Disposition::Notification(Notification::ChatMessage(event)) => {
            let task_state = app_state.clone();
            let task_id = message_id.clone();
            let task = tokio::spawn(async move {
                dispatch_chat(&task_state, &task_id, &event).await;
            });
            if let Err(e) = task.await {
                error!(%message_id, error = %e, "Command task panicked");
            }
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Disposition::Notification(Notification::Other { subscription_type }) => {
            debug!(%message_id, %subscription_type, "Notification acknowledged");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Disposition::Revocation { subscription_type } => {
            warn!(%message_id, ?subscription_type, "Subscription revoked by platform");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

async fn dispatch_chat<S, C>(
    app_state: &AppState<S, C>,
    message_id: &MessageId,
    event: &ChatMessageEvent,
) where
    S: KeyValueStore,
    C: ChatSink,
{
    debug!(
        %message_id,
        user = %event.chatter_user_login,
        text = %event.text,
        "Chat message received"
    );

    let deliveries = DeliveryLog::new(
        app_state.store(),
        app_state.lock_config(),
        app_state.delivery_retention(),
    );
    match deliveries.first_sighting(message_id, Utc::now()).await {
        Ok(true) => {}
        Ok(false) => {
            info!(%message_id, "Ignoring redelivered notification");
            return;
        }
        // Running twice is preferable to dropping a command.
        Err(e) => warn!(%message_id, error = %e, "Could not check for redelivery"),
    }

    let dispatcher = CommandDispatcher::new(
        app_state.store(),
        app_state.chat(),
        app_state.alarm(),
        app_state.lock_config(),
    )
    .ignoring_sender(app_state.bot_user_id());

    if let Err(e) = dispatcher.dispatch(event).await {
        error!(
            %message_id,
            user = %event.chatter_user_login,
            error = %e,
            "Command handling failed"
        );
    }
}
