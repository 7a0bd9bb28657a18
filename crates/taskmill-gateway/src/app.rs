use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use taskmill_store::TaskStore;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub store: TaskStore,
}

impl AppState {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/schedule", post(crate::http::schedule::schedule_handler))
        .route("/status", get(crate::http::status::status_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
