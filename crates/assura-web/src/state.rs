//! Shared application state for the web server.

use std::sync::Arc;

use assura_pipeline::{IncidentPipeline, Scheduler};
use assura_security::EncryptionGate;
use assura_store::IncidentStore;

/// Shared state injected into every Axum handler. Built once at startup;
/// the storage gateway, encryption policy, and scheduler mode are all fixed
/// from config at construction.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IncidentPipeline>,
    pub scheduler: Arc<dyn Scheduler>,
    pub store: Arc<dyn IncidentStore>,
    pub gate: EncryptionGate,
    /// Owner id assigned to unauthenticated requests. MVP auth only.
    pub default_owner: String,
}

pub type SharedState = Arc<AppState>;
