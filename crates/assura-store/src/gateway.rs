//! The persistence gateway trait and its error type.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use assura_common::{AssuraError, ExtractionRecord, Incident, IncidentStatus, TimelineEvent};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("incident not found: {0}")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for AssuraError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AssuraError::NotFound(format!("incident {id}")),
            other => AssuraError::Storage(other.to_string()),
        }
    }
}

/// Storage operations the pipeline and web layer depend on.
///
/// Mutations go through atomic update-by-id operations; timeline events are
/// append-only and readers observe them in append order.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persist a new incident together with its first timeline event, as
    /// one atomic operation.
    async fn create(&self, incident: &Incident, first_event: &TimelineEvent) -> Result<(), StoreError>;

    async fn load(&self, id: Uuid) -> Result<Incident, StoreError>;

    /// Atomic update of status and (optionally) the extraction record.
    async fn update(
        &self,
        id: Uuid,
        status: IncidentStatus,
        extraction: Option<&ExtractionRecord>,
    ) -> Result<(), StoreError>;

    async fn append_event(&self, event: &TimelineEvent) -> Result<(), StoreError>;

    /// Timeline events for one incident, in append order.
    async fn events(&self, incident_id: Uuid) -> Result<Vec<TimelineEvent>, StoreError>;

    /// Remove an incident and cascade to its events and attachment
    /// metadata.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
