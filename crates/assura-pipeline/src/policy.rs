//! Pluggable coverage and severity policies.
//!
//! The exact coverage rule set and the low-confidence severity heuristic are
//! externally configured, not hard-coded in the pipeline core. Policies may
//! fail (e.g. when backed by an external policy service); the pipeline
//! treats those failures as recoverable.

use assura_common::{ExtractionRecord, Severity};

/// Coverage verification verdict. Unknown incident types are not yet
/// verifiable, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    Covered,
    NotVerifiable { reason: String },
}

pub trait CoveragePolicy: Send + Sync {
    fn check(&self, incident_type: Option<&str>) -> anyhow::Result<Coverage>;
}

/// Substring match against a configured list of covered incident types.
pub struct CoveredTypeList {
    types: Vec<String>,
}

impl CoveredTypeList {
    pub fn new(types: Vec<String>) -> Self {
        Self {
            types: types.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl CoveragePolicy for CoveredTypeList {
    fn check(&self, incident_type: Option<&str>) -> anyhow::Result<Coverage> {
        let Some(incident_type) = incident_type.filter(|t| !t.trim().is_empty()) else {
            return Ok(Coverage::NotVerifiable {
                reason: "no incident type extracted".to_string(),
            });
        };

        let lower = incident_type.to_lowercase();
        if self.types.iter().any(|covered| lower.contains(covered)) {
            Ok(Coverage::Covered)
        } else {
            Ok(Coverage::NotVerifiable {
                reason: format!("incident type '{incident_type}' is not in the covered set"),
            })
        }
    }
}

pub trait SeverityPolicy: Send + Sync {
    /// Reconcile the stored severity with the rest of the record.
    fn reconcile(&self, record: &ExtractionRecord) -> anyhow::Result<Severity>;
}

/// Trusts the extracted severity unless confidence falls below the floor,
/// in which case the incident is forced to `high` so it gets attention.
pub struct ConfidenceFloorPolicy {
    pub floor: f64,
}

impl ConfidenceFloorPolicy {
    pub fn new(floor: f64) -> Self {
        Self { floor }
    }
}

impl Default for ConfidenceFloorPolicy {
    fn default() -> Self {
        Self { floor: 0.4 }
    }
}

impl SeverityPolicy for ConfidenceFloorPolicy {
    fn reconcile(&self, record: &ExtractionRecord) -> anyhow::Result<Severity> {
        if record.confidence < self.floor {
            Ok(Severity::High)
        } else {
            Ok(record.severity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered_list() -> CoveredTypeList {
        CoveredTypeList::new(vec![
            "car_accident".to_string(),
            "theft".to_string(),
            "water_damage".to_string(),
        ])
    }

    #[test]
    fn test_covered_type_matches_substring() {
        let policy = covered_list();
        assert_eq!(policy.check(Some("car_accident")).unwrap(), Coverage::Covered);
        // substring match, as in the original rule set
        assert_eq!(policy.check(Some("minor_car_accident")).unwrap(), Coverage::Covered);
        assert_eq!(policy.check(Some("Theft")).unwrap(), Coverage::Covered);
    }

    #[test]
    fn test_unknown_type_is_not_verifiable() {
        let policy = covered_list();
        match policy.check(Some("alien_abduction")).unwrap() {
            Coverage::NotVerifiable { reason } => assert!(reason.contains("alien_abduction")),
            other => panic!("expected NotVerifiable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_not_verifiable() {
        let policy = covered_list();
        assert!(matches!(policy.check(None).unwrap(), Coverage::NotVerifiable { .. }));
        assert!(matches!(policy.check(Some("  ")).unwrap(), Coverage::NotVerifiable { .. }));
    }

    #[test]
    fn test_severity_forced_high_under_floor() {
        let policy = ConfidenceFloorPolicy::default();
        let mut record = ExtractionRecord::safe_default();
        record.severity = Severity::Low;
        record.confidence = 0.2;
        assert_eq!(policy.reconcile(&record).unwrap(), Severity::High);
    }

    #[test]
    fn test_severity_trusted_above_floor() {
        let policy = ConfidenceFloorPolicy::default();
        let mut record = ExtractionRecord::safe_default();
        record.severity = Severity::Low;
        record.confidence = 0.75;
        assert_eq!(policy.reconcile(&record).unwrap(), Severity::Low);
    }
}
