//! Attachment metadata and analysis outcomes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attachment kinds the analyzer registry routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
    Video,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Video => "video",
        }
    }
}

/// Result of best-effort analysis on one attachment.
///
/// Analysis never fails a request: when a capability is missing or the
/// payload cannot be decoded, the outcome is `Unavailable` with a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed(AnalysisReport),
    Unavailable { reason: String },
}

impl AnalysisOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        AnalysisOutcome::Unavailable { reason: reason.into() }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Analyzed(report) => Some(report),
            AnalysisOutcome::Unavailable { .. } => None,
        }
    }
}

/// Structured metadata produced by one analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub kind: AttachmentKind,
    pub extracted_text: String,
    pub documents_detected: Vec<String>,
    pub confidence: f64,
    /// Analyzer-specific extras (page counts, dimensions, ...).
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Metadata for one uploaded file, owned by an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub analysis: AnalysisOutcome,
    pub encrypted: bool,
}

impl Attachment {
    pub fn new(
        incident_id: Uuid,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        analysis: AnalysisOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            filename: filename.into(),
            content_type: content_type.into(),
            size,
            analysis,
            encrypted: false,
        }
    }
}
