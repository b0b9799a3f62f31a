//! Append-only timeline events attached to an incident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event kinds emitted by submission, the background pipeline, and
/// external actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    IncidentCreated,
    ProcessingStarted,
    CoverageVerified,
    CoveragePending,
    SeverityUpdated,
    Escalated,
    ProcessingCompleted,
    ProcessingError,
    Closed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::IncidentCreated => "incident_created",
            EventKind::ProcessingStarted => "processing_started",
            EventKind::CoverageVerified => "coverage_verified",
            EventKind::CoveragePending => "coverage_pending",
            EventKind::SeverityUpdated => "severity_updated",
            EventKind::Escalated => "escalated",
            EventKind::ProcessingCompleted => "processing_completed",
            EventKind::ProcessingError => "processing_error",
            EventKind::Closed => "closed",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incident_created" => Ok(EventKind::IncidentCreated),
            "processing_started" => Ok(EventKind::ProcessingStarted),
            "coverage_verified" => Ok(EventKind::CoverageVerified),
            "coverage_pending" => Ok(EventKind::CoveragePending),
            "severity_updated" => Ok(EventKind::SeverityUpdated),
            "escalated" => Ok(EventKind::Escalated),
            "processing_completed" => Ok(EventKind::ProcessingCompleted),
            "processing_error" => Ok(EventKind::ProcessingError),
            "closed" => Ok(EventKind::Closed),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// One audit-log entry. Never mutated or deleted once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub kind: EventKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn new(
        incident_id: Uuid,
        kind: EventKind,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            kind,
            description: description.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}
