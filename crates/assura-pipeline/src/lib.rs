//! assura-pipeline — The incident lifecycle core.
//!
//! Owns the state machine
//! `pending → processing → extracted → {verified | escalated} → closed`,
//! the escalation decision, and the sequencing of the collaborators
//! (redaction, analysis, extraction, encryption, persistence). Background
//! execution runs through the `Scheduler` abstraction in either inline or
//! queued mode.

pub mod escalation;
pub mod pipeline;
pub mod policy;
pub mod scheduler;

pub use escalation::{EscalationPolicy, EscalationReason};
pub use pipeline::{protected_fields, IncidentPipeline, ProcessOutcome, Submission, SubmissionOutcome};
pub use policy::{ConfidenceFloorPolicy, Coverage, CoveragePolicy, CoveredTypeList, SeverityPolicy};
pub use scheduler::{InlineScheduler, QueuedScheduler, Scheduler};
