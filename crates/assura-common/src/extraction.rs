//! Structured extraction record produced by the LLM adapter.

use serde::{Deserialize, Serialize};

/// Incident severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Fields extracted from an incident story.
///
/// The record is always populated before an incident leaves `pending`;
/// when extraction fails upstream the safe default stands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub incident_type: Option<String>,
    pub severity: Severity,
    pub date: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub people_involved: Vec<String>,
    #[serde(default)]
    pub documents_detected: Vec<String>,
    pub confidence: f64,
    pub needs_human: bool,
}

impl ExtractionRecord {
    /// Fallback record used when the extraction collaborator fails or
    /// returns unparseable output: empty fields, zero confidence, flagged
    /// for human review.
    pub fn safe_default() -> Self {
        Self {
            incident_type: None,
            severity: Severity::Medium,
            date: None,
            location: None,
            people_involved: Vec::new(),
            documents_detected: Vec::new(),
            confidence: 0.0,
            needs_human: true,
        }
    }

    /// True when incident type, date, and location are all present and
    /// non-empty.
    pub fn has_critical_fields(&self) -> bool {
        !field_missing(&self.incident_type)
            && !field_missing(&self.date)
            && !field_missing(&self.location)
    }

    /// Names of the critical fields that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if field_missing(&self.incident_type) {
            missing.push("incident_type");
        }
        if field_missing(&self.date) {
            missing.push("date");
        }
        if field_missing(&self.location) {
            missing.push("location");
        }
        missing
    }
}

fn field_missing(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_default_is_flagged() {
        let r = ExtractionRecord::safe_default();
        assert_eq!(r.confidence, 0.0);
        assert!(r.needs_human);
        assert!(!r.has_critical_fields());
    }

    #[test]
    fn test_missing_fields_names() {
        let mut r = ExtractionRecord::safe_default();
        r.incident_type = Some("theft".to_string());
        r.date = Some("  ".to_string()); // whitespace counts as missing
        assert_eq!(r.missing_fields(), vec!["date", "location"]);
    }

    #[test]
    fn test_severity_round_trip() {
        for s in ["low", "medium", "high"] {
            let sev: Severity = s.parse().unwrap();
            assert_eq!(sev.as_str(), s);
        }
        assert!("critical".parse::<Severity>().is_err());
    }
}
