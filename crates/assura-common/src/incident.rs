//! The central incident entity and its lifecycle states.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::Attachment;
use crate::extraction::ExtractionRecord;

/// Incident processing status.
///
/// Transitions move only forward along the state machine:
/// `pending → processing → extracted → {verified | escalated} → closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Pending,
    Processing,
    Extracted,
    Verified,
    Escalated,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Processing => "processing",
            IncidentStatus::Extracted => "extracted",
            IncidentStatus::Verified => "verified",
            IncidentStatus::Escalated => "escalated",
            IncidentStatus::Closed => "closed",
        }
    }

    /// Position along the lifecycle; equal-rank states are the two
    /// branches out of `extracted`.
    pub fn rank(&self) -> u8 {
        match self {
            IncidentStatus::Pending => 0,
            IncidentStatus::Processing => 1,
            IncidentStatus::Extracted => 2,
            IncidentStatus::Verified => 3,
            IncidentStatus::Escalated => 3,
            IncidentStatus::Closed => 4,
        }
    }

    /// True when this status is `other` or anything later in the lifecycle.
    pub fn at_least(&self, other: IncidentStatus) -> bool {
        self.rank() >= other.rank()
    }

    /// Whether the state machine admits a direct transition to `next`.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Extracted)
                | (Processing, Escalated)
                | (Extracted, Verified)
                | (Extracted, Escalated)
                | (Verified, Closed)
                | (Escalated, Closed)
        )
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IncidentStatus::Pending),
            "processing" => Ok(IncidentStatus::Processing),
            "extracted" => Ok(IncidentStatus::Extracted),
            "verified" => Ok(IncidentStatus::Verified),
            "escalated" => Ok(IncidentStatus::Escalated),
            "closed" => Ok(IncidentStatus::Closed),
            other => Err(format!("unknown incident status: {other}")),
        }
    }
}

/// A submitted incident report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub owner_id: String,
    pub status: IncidentStatus,
    /// Original story as submitted. Subject to the encryption policy at rest.
    pub story_text: String,
    /// Story with personal identifiers replaced by pseudonyms; this is what
    /// leaves the process boundary.
    pub redacted_story: String,
    /// pseudonym → original value
    pub pseudonym_map: HashMap<String, String>,
    pub extraction: ExtractionRecord,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(owner_id: impl Into<String>, story_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            status: IncidentStatus::Pending,
            story_text: story_text.into(),
            redacted_story: String::new(),
            pseudonym_map: HashMap::new(),
            extraction: ExtractionRecord::safe_default(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        use IncidentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Extracted));
        assert!(Processing.can_transition_to(Escalated));
        assert!(Extracted.can_transition_to(Verified));
        assert!(Extracted.can_transition_to(Escalated));
        assert!(Verified.can_transition_to(Closed));
        assert!(Escalated.can_transition_to(Closed));
    }

    #[test]
    fn test_no_backward_transitions() {
        use IncidentStatus::*;
        for from in [Extracted, Verified, Escalated, Closed] {
            assert!(!from.can_transition_to(Pending));
            assert!(!from.can_transition_to(Processing));
        }
        assert!(!Closed.can_transition_to(Verified));
        assert!(!Escalated.can_transition_to(Verified));
    }

    #[test]
    fn test_status_string_round_trip() {
        use IncidentStatus::*;
        for status in [Pending, Processing, Extracted, Verified, Escalated, Closed] {
            let parsed: IncidentStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_at_least_ordering() {
        use IncidentStatus::*;
        assert!(Extracted.at_least(Extracted));
        assert!(Verified.at_least(Extracted));
        assert!(Escalated.at_least(Extracted));
        assert!(!Processing.at_least(Extracted));
    }
}
