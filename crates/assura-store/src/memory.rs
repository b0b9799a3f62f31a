//! In-memory persistence gateway.
//!
//! Process-lifetime storage behind the same trait as the durable gateway.
//! A restart loses all data; that is the documented trade-off of this mode,
//! not a defect.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use assura_common::{ExtractionRecord, Incident, IncidentStatus, TimelineEvent};

use crate::gateway::{IncidentStore, StoreError};

struct StoredIncident {
    incident: Incident,
    events: Vec<TimelineEvent>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<Uuid, StoredIncident>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn create(&self, incident: &Incident, first_event: &TimelineEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.insert(
            incident.id,
            StoredIncident {
                incident: incident.clone(),
                events: vec![first_event.clone()],
            },
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Incident, StoreError> {
        let inner = self.inner.read().await;
        inner
            .get(&id)
            .map(|stored| stored.incident.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(
        &self,
        id: Uuid,
        status: IncidentStatus,
        extraction: Option<&ExtractionRecord>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stored.incident.status = status;
        if let Some(record) = extraction {
            stored.incident.extraction = record.clone();
        }
        stored.incident.updated_at = Utc::now();
        Ok(())
    }

    async fn append_event(&self, event: &TimelineEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .get_mut(&event.incident_id)
            .ok_or(StoreError::NotFound(event.incident_id))?;
        stored.events.push(event.clone());
        Ok(())
    }

    async fn events(&self, incident_id: Uuid) -> Result<Vec<TimelineEvent>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .get(&incident_id)
            .map(|stored| stored.events.clone())
            .ok_or(StoreError::NotFound(incident_id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.remove(&id).ok_or(StoreError::NotFound(id))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assura_common::EventKind;

    fn sample() -> (Incident, TimelineEvent) {
        let incident = Incident::new("user-1", "my car was hit");
        let event = TimelineEvent::new(
            incident.id,
            EventKind::IncidentCreated,
            "Incident submitted",
            None,
        );
        (incident, event)
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let store = MemoryStore::new();
        let (incident, event) = sample();
        store.create(&incident, &event).await.unwrap();

        let loaded = store.load(incident.id).await.unwrap();
        assert_eq!(loaded.id, incident.id);
        assert_eq!(loaded.status, IncidentStatus::Pending);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_is_not_found() {
        let store = MemoryStore::new();
        let err = store.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_status_and_extraction() {
        let store = MemoryStore::new();
        let (incident, event) = sample();
        store.create(&incident, &event).await.unwrap();

        let mut record = incident.extraction.clone();
        record.confidence = 0.9;
        store
            .update(incident.id, IncidentStatus::Processing, Some(&record))
            .await
            .unwrap();

        let loaded = store.load(incident.id).await.unwrap();
        assert_eq!(loaded.status, IncidentStatus::Processing);
        assert_eq!(loaded.extraction.confidence, 0.9);
        assert!(loaded.updated_at >= incident.updated_at);
    }

    #[tokio::test]
    async fn test_events_keep_append_order() {
        let store = MemoryStore::new();
        let (incident, event) = sample();
        store.create(&incident, &event).await.unwrap();

        for kind in [EventKind::ProcessingStarted, EventKind::CoverageVerified] {
            store
                .append_event(&TimelineEvent::new(incident.id, kind, kind.as_str(), None))
                .await
                .unwrap();
        }

        let events = store.events(incident.id).await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::IncidentCreated,
                EventKind::ProcessingStarted,
                EventKind::CoverageVerified
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = MemoryStore::new();
        let (incident, event) = sample();
        store.create(&incident, &event).await.unwrap();
        store.delete(incident.id).await.unwrap();

        assert!(matches!(store.load(incident.id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.events(incident.id).await, Err(StoreError::NotFound(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
