//! Liveness probe.

use axum::Json;
use serde_json::json;

/// GET /health - no business logic, just proof of life.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "operational",
        "service": "assura",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
