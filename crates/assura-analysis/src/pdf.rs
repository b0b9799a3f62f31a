//! PDF attachment analysis with lopdf.

use assura_common::{AnalysisOutcome, AnalysisReport, AttachmentKind};
use lopdf::Document;
use tracing::debug;

use crate::Analyzer;

/// Extracts page text from PDF attachments and detects document types by
/// keyword.
pub struct PdfAnalyzer;

impl Analyzer for PdfAnalyzer {
    fn kind(&self) -> AttachmentKind {
        AttachmentKind::Pdf
    }

    fn analyze(&self, data: &[u8], filename: &str) -> AnalysisOutcome {
        let doc = match Document::load_mem(data) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(filename, error = %e, "PDF decode failed");
                return AnalysisOutcome::unavailable(format!("pdf decode failed: {e}"));
            }
        };

        let pages = doc.get_pages();
        let mut text_parts = Vec::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => text_parts.push(text),
                Err(e) => {
                    debug!(filename, page = page_num, error = %e, "page text extraction failed");
                }
            }
        }

        let full_text = text_parts.join("\n\n");
        let documents_detected = detect_document_types(&full_text);
        let confidence = if full_text.trim().is_empty() { 0.3 } else { 0.8 };

        AnalysisOutcome::Analyzed(AnalysisReport {
            kind: AttachmentKind::Pdf,
            extracted_text: full_text,
            documents_detected,
            confidence,
            extra: serde_json::json!({ "page_count": pages.len() }),
        })
    }
}

/// Keyword-based document type detection over extracted text.
fn detect_document_types(text: &str) -> Vec<String> {
    let groups: [(&str, &[&str]); 5] = [
        ("police_report", &["police", "report", "incident"]),
        ("medical_record", &["medical", "hospital", "doctor"]),
        ("receipt", &["invoice", "receipt", "bill"]),
        ("license", &["license", "driving", "permit"]),
        ("insurance_document", &["insurance", "policy", "coverage"]),
    ];

    let lower = text.to_lowercase();
    groups
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(doc_type, _)| doc_type.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bytes_give_unavailable() {
        let outcome = PdfAnalyzer.analyze(b"definitely not a pdf", "claim.pdf");
        match outcome {
            AnalysisOutcome::Unavailable { reason } => {
                assert!(reason.contains("pdf decode failed"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_document_type_detection() {
        let detected = detect_document_types("Police report filed at the hospital; see attached invoice.");
        assert!(detected.contains(&"police_report".to_string()));
        assert!(detected.contains(&"medical_record".to_string()));
        assert!(detected.contains(&"receipt".to_string()));
        assert!(!detected.contains(&"license".to_string()));
    }

    #[test]
    fn test_no_keywords_detected() {
        assert!(detect_document_types("nothing of note").is_empty());
        assert!(detect_document_types("").is_empty());
    }
}
