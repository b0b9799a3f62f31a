//! Escalation decision.
//!
//! A pure function of the extraction record, re-derivable from the stored
//! incident alone. This predicate is the single source of truth for
//! entering `escalated`.

use serde::{Deserialize, Serialize};

use assura_common::ExtractionRecord;

/// Why an incident was routed to human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    LowConfidence,
    MissingFields,
    FlaggedByExtractor,
    ProcessingError,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::LowConfidence => "low_confidence",
            EscalationReason::MissingFields => "missing_fields",
            EscalationReason::FlaggedByExtractor => "flagged_by_extractor",
            EscalationReason::ProcessingError => "processing_error",
        }
    }
}

/// Threshold configuration for the escalation predicate.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub min_confidence: f64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self { min_confidence: 0.6 }
    }
}

impl EscalationPolicy {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// The escalation predicate. Checks run in priority order: confidence,
    /// then critical fields, then the extractor's own flag.
    pub fn reason(&self, record: &ExtractionRecord) -> Option<EscalationReason> {
        if record.confidence < self.min_confidence {
            return Some(EscalationReason::LowConfidence);
        }
        if !record.has_critical_fields() {
            return Some(EscalationReason::MissingFields);
        }
        if record.needs_human {
            return Some(EscalationReason::FlaggedByExtractor);
        }
        None
    }

    pub fn should_escalate(&self, record: &ExtractionRecord) -> bool {
        self.reason(record).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assura_common::Severity;

    fn complete_record(confidence: f64) -> ExtractionRecord {
        ExtractionRecord {
            incident_type: Some("car_accident".to_string()),
            severity: Severity::Medium,
            date: Some("2024-01-15".to_string()),
            location: Some("123 Main Street".to_string()),
            people_involved: vec![],
            documents_detected: vec![],
            confidence,
            needs_human: false,
        }
    }

    #[test]
    fn test_low_confidence_escalates() {
        let policy = EscalationPolicy::default();
        let record = complete_record(0.59);
        assert_eq!(policy.reason(&record), Some(EscalationReason::LowConfidence));
        assert!(policy.should_escalate(&record));
    }

    #[test]
    fn test_confident_complete_record_passes() {
        let policy = EscalationPolicy::default();
        let record = complete_record(0.85);
        assert_eq!(policy.reason(&record), None);
        assert!(!policy.should_escalate(&record));
    }

    #[test]
    fn test_missing_location_escalates_despite_confidence() {
        let policy = EscalationPolicy::default();
        let mut record = complete_record(0.9);
        record.location = None;
        assert_eq!(policy.reason(&record), Some(EscalationReason::MissingFields));
    }

    #[test]
    fn test_extractor_flag_escalates() {
        let policy = EscalationPolicy::default();
        let mut record = complete_record(0.9);
        record.needs_human = true;
        assert_eq!(policy.reason(&record), Some(EscalationReason::FlaggedByExtractor));
    }

    #[test]
    fn test_low_confidence_takes_priority() {
        let policy = EscalationPolicy::default();
        let mut record = complete_record(0.2);
        record.location = None;
        record.needs_human = true;
        assert_eq!(policy.reason(&record), Some(EscalationReason::LowConfidence));
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        let policy = EscalationPolicy::default();
        assert_eq!(policy.reason(&complete_record(0.6)), None);
    }
}
