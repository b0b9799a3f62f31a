//! Analyzer registry resolved once at startup.
//!
//! Content types route to attachment kinds; each kind maps to exactly one
//! analyzer fixed at construction. There is no feature probing inside
//! request handling: a capability that is absent stays a `NullAnalyzer`
//! for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use assura_common::{AnalysisOutcome, AttachmentKind};
use tracing::warn;

use crate::pdf::PdfAnalyzer;
use crate::{Analyzer, NullAnalyzer};

/// An uploaded file before analysis.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<AttachmentKind, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// Resolve analyzers from the configured capability flags.
    pub fn resolve(pdf: bool, image: bool, video: bool) -> Self {
        let mut analyzers: HashMap<AttachmentKind, Arc<dyn Analyzer>> = HashMap::new();

        analyzers.insert(
            AttachmentKind::Pdf,
            if pdf {
                Arc::new(PdfAnalyzer)
            } else {
                Arc::new(NullAnalyzer::new(
                    AttachmentKind::Pdf,
                    "pdf analysis disabled by configuration",
                ))
            },
        );

        // No OCR or video capability ships with this build; the seam stays
        // so a real analyzer slots in per kind.
        analyzers.insert(
            AttachmentKind::Image,
            Arc::new(NullAnalyzer::new(
                AttachmentKind::Image,
                if image {
                    "ocr backend not available in this build"
                } else {
                    "image analysis disabled by configuration"
                },
            )),
        );
        analyzers.insert(
            AttachmentKind::Video,
            Arc::new(NullAnalyzer::new(
                AttachmentKind::Video,
                if video {
                    "video analysis backend not available in this build"
                } else {
                    "video analysis disabled by configuration"
                },
            )),
        );

        Self { analyzers }
    }

    /// Map a declared content type to an attachment kind.
    pub fn classify(content_type: &str) -> Option<AttachmentKind> {
        let ct = content_type.to_lowercase();
        if ct.starts_with("image/") {
            Some(AttachmentKind::Image)
        } else if ct == "application/pdf" {
            Some(AttachmentKind::Pdf)
        } else if ct.starts_with("video/") {
            Some(AttachmentKind::Video)
        } else {
            None
        }
    }

    /// Analyze one attachment. Never fails; heavy parsing runs off the
    /// async executor.
    pub async fn analyze(&self, attachment: &RawAttachment) -> AnalysisOutcome {
        let Some(kind) = Self::classify(&attachment.content_type) else {
            warn!(
                filename = %attachment.filename,
                content_type = %attachment.content_type,
                "unsupported attachment content type"
            );
            return AnalysisOutcome::unavailable(format!(
                "unsupported content type: {}",
                attachment.content_type
            ));
        };

        let analyzer = match self.analyzers.get(&kind) {
            Some(analyzer) => analyzer.clone(),
            None => return AnalysisOutcome::unavailable(format!("no analyzer for {}", kind.as_str())),
        };

        let data = attachment.data.clone();
        let filename = attachment.filename.clone();
        match tokio::task::spawn_blocking(move || analyzer.analyze(&data, &filename)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "analysis task failed");
                AnalysisOutcome::unavailable("analysis task failed")
            }
        }
    }

    /// Aggregate per-attachment outcomes for the extraction prompt:
    /// union of detected documents, collected texts, max confidence.
    pub fn aggregate(outcomes: &[AnalysisOutcome]) -> AggregateAnalysis {
        let mut agg = AggregateAnalysis::default();

        for outcome in outcomes {
            match outcome {
                AnalysisOutcome::Analyzed(report) => {
                    agg.analyzed += 1;
                    for doc in &report.documents_detected {
                        if !agg.documents_detected.contains(doc) {
                            agg.documents_detected.push(doc.clone());
                        }
                    }
                    if !report.extracted_text.trim().is_empty() {
                        agg.extracted_texts.push(report.extracted_text.clone());
                    }
                    agg.confidence = agg.confidence.max(report.confidence);
                }
                AnalysisOutcome::Unavailable { .. } => {
                    agg.unavailable += 1;
                }
            }
        }

        agg
    }
}

/// Cross-attachment analysis summary.
#[derive(Debug, Clone, Default)]
pub struct AggregateAnalysis {
    pub documents_detected: Vec<String>,
    pub extracted_texts: Vec<String>,
    pub confidence: f64,
    pub analyzed: usize,
    pub unavailable: usize,
}
