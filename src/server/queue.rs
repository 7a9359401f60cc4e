//! Read-only view of the sign-up queue.
//!
//! Reads the stored queue directly, without the read-prepare lock: like
//! `!queue` in chat, the view tolerates a snapshot that is slightly stale.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use super::AppState;
use crate::queue::{QueueEntry, read_queue};
use crate::store::{KeyValueStore, StoreError};

#[derive(Debug, Error)]
#[error("queue unavailable: {0}")]
pub struct QueueViewError(#[from] StoreError);

impl IntoResponse for QueueViewError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}

/// `GET /queue`: the queue entries in order, as a JSON array.
pub async fn queue_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
) -> Result<Json<Vec<QueueEntry>>, QueueViewError>
where
    S: KeyValueStore,
{
    let queue = read_queue(app_state.store()).await.inspect_err(|e| {
        error!(error = %e, "Failed to read queue for view");
    })?;
    Ok(Json(queue.entries().to_vec()))
}
