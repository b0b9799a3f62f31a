//! assura-analysis — Best-effort attachment analysis.
//!
//! Each attachment kind resolves to one `Analyzer` at startup. Analysis
//! never fails a request: a missing capability, unsupported format, or
//! decode failure produces an `Unavailable` outcome on that attachment and
//! the incident proceeds.

pub mod pdf;
pub mod registry;

pub use pdf::PdfAnalyzer;
pub use registry::{AggregateAnalysis, AnalyzerRegistry, RawAttachment};

use assura_common::{AnalysisOutcome, AttachmentKind};

/// Per-kind analyzer. Implementations must be total: any problem with the
/// payload is reported through the outcome, never as an error.
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AttachmentKind;
    fn analyze(&self, data: &[u8], filename: &str) -> AnalysisOutcome;
}

/// Stands in for a capability that is not built in or disabled; always
/// returns `Unavailable` with the configured reason.
pub struct NullAnalyzer {
    kind: AttachmentKind,
    reason: String,
}

impl NullAnalyzer {
    pub fn new(kind: AttachmentKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

impl Analyzer for NullAnalyzer {
    fn kind(&self) -> AttachmentKind {
        self.kind
    }

    fn analyze(&self, _data: &[u8], filename: &str) -> AnalysisOutcome {
        tracing::debug!(filename, kind = self.kind.as_str(), reason = %self.reason, "analysis capability unavailable");
        AnalysisOutcome::unavailable(self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_analyzer_reports_unavailable() {
        let analyzer = NullAnalyzer::new(AttachmentKind::Video, "video analysis not configured");
        let outcome = analyzer.analyze(b"anything", "clip.mp4");
        assert_eq!(
            outcome,
            AnalysisOutcome::unavailable("video analysis not configured")
        );
    }
}
