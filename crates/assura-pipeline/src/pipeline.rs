//! Incident pipeline orchestration.
//!
//! `submit` sequences the collaborators for an inbound report and persists
//! the incident atomically with its first timeline event. `process` is the
//! background transition: coverage verification, severity reconciliation,
//! and the escalation decision, appending events in that order. Re-running
//! `process` on an incident that already reached `extracted` is a no-op
//! apart from re-validating the escalation predicate.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use assura_analysis::{AnalyzerRegistry, RawAttachment};
use assura_common::{
    AnalysisOutcome, AssuraError, Attachment, EventKind, ExtractionRecord, Incident,
    IncidentStatus, Result, TimelineEvent,
};
use assura_llm::{merge_with_analysis, IncidentExtractor};
use assura_security::pii;
use assura_security::EncryptionGate;
use assura_store::IncidentStore;

use crate::escalation::{EscalationPolicy, EscalationReason};
use crate::policy::{Coverage, CoveragePolicy, SeverityPolicy};

/// Extraction-record fields the encryption gate protects at rest.
pub fn protected_fields(record: &ExtractionRecord) -> Vec<String> {
    serde_json::to_value(record)
        .ok()
        .and_then(|value| {
            value.as_object().map(|map| {
                map.keys()
                    .filter(|key| pii::is_pii_field(key))
                    .cloned()
                    .collect()
            })
        })
        .unwrap_or_default()
}

/// An inbound create request.
pub struct Submission {
    pub owner_id: String,
    pub story_text: String,
    pub files: Vec<RawAttachment>,
}

/// What the API returns for an accepted submission. The extraction record
/// here is the plaintext, best-effort record; the stored copy may be
/// encrypted.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub incident_id: Uuid,
    pub status: IncidentStatus,
    pub extraction: ExtractionRecord,
}

/// Summary of one Process run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub incident_id: Uuid,
    pub status: IncidentStatus,
    pub escalation: Option<EscalationReason>,
    pub events_appended: usize,
}

pub struct IncidentPipeline {
    store: Arc<dyn IncidentStore>,
    extractor: Arc<IncidentExtractor>,
    registry: Arc<AnalyzerRegistry>,
    gate: EncryptionGate,
    escalation: EscalationPolicy,
    coverage: Arc<dyn CoveragePolicy>,
    severity: Arc<dyn SeverityPolicy>,
}

impl IncidentPipeline {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        extractor: Arc<IncidentExtractor>,
        registry: Arc<AnalyzerRegistry>,
        gate: EncryptionGate,
        escalation: EscalationPolicy,
        coverage: Arc<dyn CoveragePolicy>,
        severity: Arc<dyn SeverityPolicy>,
    ) -> Self {
        Self { store, extractor, registry, gate, escalation, coverage, severity }
    }

    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.store
    }

    pub fn gate(&self) -> &EncryptionGate {
        &self.gate
    }

    // ── Submit ────────────────────────────────────────────────────────────────

    /// Accept an inbound report: pseudonymize, analyze attachments,
    /// extract, encrypt, persist. The extraction record is computed before
    /// the incident is stored, so the response never carries a stub.
    #[instrument(skip(self, submission), fields(owner_id = %submission.owner_id))]
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome> {
        if submission.story_text.trim().is_empty() {
            return Err(AssuraError::Validation(
                "story_text must not be empty".to_string(),
            ));
        }

        let mut incident = Incident::new(submission.owner_id, submission.story_text);

        let (redacted, pseudonym_map) = pii::pseudonymize(&incident.story_text);
        incident.redacted_story = redacted;
        incident.pseudonym_map = pseudonym_map;

        // Best-effort attachment analysis; an unavailable capability never
        // fails the request.
        let mut outcomes = Vec::with_capacity(submission.files.len());
        let mut attachments = Vec::with_capacity(submission.files.len());
        for file in &submission.files {
            let outcome = self.registry.analyze(file).await;
            attachments.push(Attachment::new(
                incident.id,
                file.filename.clone(),
                file.content_type.clone(),
                file.data.len() as u64,
                outcome.clone(),
            ));
            outcomes.push(outcome);
        }
        let aggregate = AnalyzerRegistry::aggregate(&outcomes);

        let record = self
            .extractor
            .extract(&incident.redacted_story, &aggregate.extracted_texts)
            .await;
        let record = merge_with_analysis(&record, &aggregate.documents_detected, aggregate.confidence);

        // At-rest protection, selected once at startup.
        let fields = protected_fields(&record);
        incident.extraction = self
            .gate
            .encrypt_fields(&record, &fields)
            .map_err(|e| AssuraError::Crypto(e.to_string()))?;
        incident.story_text = self
            .gate
            .encrypt_field(&incident.story_text)
            .map_err(|e| AssuraError::Crypto(e.to_string()))?;
        if self.gate.is_active() {
            for attachment in &mut attachments {
                if let AnalysisOutcome::Analyzed(report) = &mut attachment.analysis {
                    report.extracted_text = self
                        .gate
                        .encrypt_field(&report.extracted_text)
                        .map_err(|e| AssuraError::Crypto(e.to_string()))?;
                    attachment.encrypted = true;
                }
            }
        }
        incident.attachments = attachments;

        let first_event = TimelineEvent::new(
            incident.id,
            EventKind::IncidentCreated,
            "Incident submitted and initial extraction completed",
            Some(json!({
                "confidence": record.confidence,
                "needs_human": record.needs_human,
                "attachments": incident.attachments.len(),
            })),
        );

        self.store.create(&incident, &first_event).await?;

        info!(
            incident_id = %incident.id,
            confidence = record.confidence,
            attachments = incident.attachments.len(),
            "incident created"
        );

        Ok(SubmissionOutcome {
            incident_id: incident.id,
            status: IncidentStatus::Pending,
            extraction: record,
        })
    }

    // ── Process ───────────────────────────────────────────────────────────────

    /// Background transition `pending → processing → extracted →
    /// {verified | escalated}`. Safe under at-least-once delivery.
    #[instrument(skip(self))]
    pub async fn process(&self, incident_id: Uuid) -> Result<ProcessOutcome> {
        let incident = self.store.load(incident_id).await?;

        // Idempotence guard: a redelivered trigger re-validates the
        // escalation predicate but appends no events and never regresses
        // the status.
        if incident.status.at_least(IncidentStatus::Extracted) {
            let escalation = self.escalation.reason(&incident.extraction);
            debug!(
                incident_id = %incident_id,
                status = %incident.status,
                escalation = ?escalation,
                "process re-delivered for settled incident, skipping"
            );
            return Ok(ProcessOutcome {
                incident_id,
                status: incident.status,
                escalation,
                events_appended: 0,
            });
        }

        match self.run_steps(&incident).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(incident_id = %incident_id, error = %err, "processing failed, escalating");
                let event = TimelineEvent::new(
                    incident_id,
                    EventKind::Escalated,
                    format!("Incident escalated after processing error: {err}"),
                    Some(json!({ "reason": EscalationReason::ProcessingError.as_str() })),
                );
                // Best effort: if storage is the thing that failed, the
                // next delivery retries the whole transition.
                let _ = self.store.append_event(&event).await;
                let _ = self
                    .store
                    .update(incident_id, IncidentStatus::Escalated, None)
                    .await;
                Err(err)
            }
        }
    }

    async fn run_steps(&self, incident: &Incident) -> Result<ProcessOutcome> {
        let incident_id = incident.id;
        let mut events_appended = 0usize;

        if incident.status == IncidentStatus::Pending {
            self.store
                .update(incident_id, IncidentStatus::Processing, None)
                .await?;
        }
        events_appended += self
            .append(TimelineEvent::new(
                incident_id,
                EventKind::ProcessingStarted,
                "Background processing started",
                None,
            ))
            .await;

        let mut record = incident.extraction.clone();

        // Sub-step 1: coverage verification. Unknown types are not yet
        // verifiable; a human confirms them through the escalation path.
        match self.coverage.check(record.incident_type.as_deref()) {
            Ok(Coverage::Covered) => {
                events_appended += self
                    .append(TimelineEvent::new(
                        incident_id,
                        EventKind::CoverageVerified,
                        "Coverage verified for incident type",
                        Some(json!({ "incident_type": record.incident_type })),
                    ))
                    .await;
            }
            Ok(Coverage::NotVerifiable { reason }) => {
                record.needs_human = true;
                events_appended += self
                    .append(TimelineEvent::new(
                        incident_id,
                        EventKind::CoveragePending,
                        "Coverage could not be verified automatically",
                        Some(json!({ "reason": reason })),
                    ))
                    .await;
            }
            Err(err) => {
                warn!(incident_id = %incident_id, error = %err, "coverage policy failed, continuing");
                record.needs_human = true;
            }
        }

        // Sub-step 2: severity reconciliation.
        match self.severity.reconcile(&record) {
            Ok(severity) if severity != record.severity => {
                let previous = record.severity;
                record.severity = severity;
                events_appended += self
                    .append(TimelineEvent::new(
                        incident_id,
                        EventKind::SeverityUpdated,
                        format!("Severity updated to {}", severity.as_str()),
                        Some(json!({
                            "previous": previous.as_str(),
                            "new": severity.as_str(),
                        })),
                    ))
                    .await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(incident_id = %incident_id, error = %err, "severity policy failed, continuing");
                record.needs_human = true;
            }
        }

        self.store
            .update(incident_id, IncidentStatus::Extracted, Some(&record))
            .await?;

        // Sub-step 3: escalation decision.
        let escalation = self.escalation.reason(&record);
        let status = match escalation {
            Some(reason) => {
                events_appended += self
                    .append(TimelineEvent::new(
                        incident_id,
                        EventKind::Escalated,
                        "Incident escalated to human agent",
                        Some(json!({ "reason": reason.as_str() })),
                    ))
                    .await;
                self.store
                    .update(incident_id, IncidentStatus::Escalated, None)
                    .await?;
                IncidentStatus::Escalated
            }
            None => {
                events_appended += self
                    .append(TimelineEvent::new(
                        incident_id,
                        EventKind::ProcessingCompleted,
                        "Incident processing completed successfully",
                        None,
                    ))
                    .await;
                self.store
                    .update(incident_id, IncidentStatus::Verified, None)
                    .await?;
                IncidentStatus::Verified
            }
        };

        info!(
            incident_id = %incident_id,
            status = %status,
            escalation = ?escalation,
            events = events_appended,
            "incident processed"
        );

        Ok(ProcessOutcome { incident_id, status, escalation, events_appended })
    }

    /// Append an event, counting it on success. A failed append is a
    /// recoverable sub-step error: processing continues.
    async fn append(&self, event: TimelineEvent) -> usize {
        match self.store.append_event(&event).await {
            Ok(()) => 1,
            Err(err) => {
                warn!(
                    incident_id = %event.incident_id,
                    kind = event.kind.as_str(),
                    error = %err,
                    "failed to append timeline event"
                );
                0
            }
        }
    }

    // ── Close ─────────────────────────────────────────────────────────────────

    /// External close action from `verified` or `escalated`.
    pub async fn close(&self, incident_id: Uuid) -> Result<IncidentStatus> {
        let incident = self.store.load(incident_id).await?;
        if !incident.status.can_transition_to(IncidentStatus::Closed) {
            return Err(AssuraError::Validation(format!(
                "cannot close incident in status {}",
                incident.status
            )));
        }

        self.store
            .append_event(&TimelineEvent::new(
                incident_id,
                EventKind::Closed,
                "Incident closed",
                None,
            ))
            .await?;
        self.store
            .update(incident_id, IncidentStatus::Closed, None)
            .await?;

        info!(incident_id = %incident_id, "incident closed");
        Ok(IncidentStatus::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assura_common::Severity;

    #[test]
    fn test_protected_fields_cover_pii_bearing_keys() {
        let record = ExtractionRecord::safe_default();
        let fields = protected_fields(&record);
        assert!(fields.contains(&"date".to_string()));
        assert!(fields.contains(&"location".to_string()));
        assert!(fields.contains(&"people_involved".to_string()));
        assert!(!fields.contains(&"confidence".to_string()));
        assert!(!fields.contains(&"severity".to_string()));
        assert!(!fields.contains(&"incident_type".to_string()));
    }

    #[test]
    fn test_protected_fields_independent_of_values() {
        let mut a = ExtractionRecord::safe_default();
        a.location = Some("somewhere".to_string());
        a.severity = Severity::High;
        let b = ExtractionRecord::safe_default();
        assert_eq!(protected_fields(&a), protected_fields(&b));
    }
}
