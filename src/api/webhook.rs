//! Webhook handler for GitLab push events

use axum::{
    body::Bytes,
    extract::State as AxumState,
    extract::rejection::BytesRejection,
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::SharedState;
use crate::utils::dispatch_event;
use crate::webhook::PushEvent;

/// Handles a push notification on any path and with any method.
///
/// The sender always gets an empty `200 OK`; problems with the body or with
/// the commands only show up in the logs.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!("Could not read request body: {}", e);
            return StatusCode::OK;
        }
    };

    let event = match PushEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Could not parse push event: {}", e);
            return StatusCode::OK;
        }
    };

    // Run on its own task so a panic while dispatching stays contained to this request.
    let task_state = Arc::clone(&state);
    let dispatch = tokio::spawn(async move { dispatch_event(&task_state, &event).await });

    match dispatch.await {
        Ok(summary) => debug!(
            "Push on '{}' matched {} rule(s): {} inline, {} detached",
            summary.branch,
            summary.matched_rules,
            summary.executions.len(),
            summary.detached
        ),
        Err(e) => error!("Push event dispatch aborted: {}", e),
    }

    StatusCode::OK
}
