//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::incidents::{close_incident, create_incident, delete_incident, get_incident};
use crate::handlers::system::health;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(health))
        .route("/incident", post(create_incident))
        .route("/incident/{id}", get(get_incident).delete(delete_incident))
        .route("/incident/{id}/close", post(close_incident))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
