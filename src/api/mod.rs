//! HTTP surface: a single catch-all route feeding the dispatcher

pub mod webhook;

pub use webhook::handle_webhook;

use axum::Router;

use crate::SharedState;

/// Every path and method ends up in [`handle_webhook`].
pub fn router(state: SharedState) -> Router {
    Router::new().fallback(handle_webhook).with_state(state)
}
