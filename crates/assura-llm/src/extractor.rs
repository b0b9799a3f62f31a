//! Incident extraction adapter.
//!
//! Sends the redacted story (plus any attachment-analysis text) to the
//! configured backend and parses the constrained JSON reply into an
//! `ExtractionRecord`. The fallback contract is mandatory: transport
//! failures, timeouts, and malformed output all yield the safe-default
//! record instead of an error.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use assura_common::{ExtractionRecord, Severity};

use crate::backend::{LlmBackend, LlmRequest, Message};

pub struct IncidentExtractor {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
    max_tokens: u32,
}

impl IncidentExtractor {
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout, max_tokens: 1024 }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Extract structured incident data. Never fails: any upstream problem
    /// is absorbed into the safe-default record.
    pub async fn extract(
        &self,
        redacted_story: &str,
        analysis_texts: &[String],
    ) -> ExtractionRecord {
        let prompt = build_prompt(redacted_story, analysis_texts);
        let req = LlmRequest {
            messages: vec![Message { role: "user".to_string(), content: prompt }],
            model: None,
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.1),
        };

        let response = match tokio::time::timeout(self.timeout, self.backend.complete(req)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(model = self.backend.model_id(), error = %e, "extraction backend failed, using safe default");
                return ExtractionRecord::safe_default();
            }
            Err(_) => {
                warn!(model = self.backend.model_id(), timeout_ms = self.timeout.as_millis() as u64, "extraction timed out, using safe default");
                return ExtractionRecord::safe_default();
            }
        };

        parse_extraction(&response.content)
    }
}

// ── Prompt ────────────────────────────────────────────────────────────────────

fn build_prompt(story: &str, analysis_texts: &[String]) -> String {
    let mut analysis_context = String::new();
    if !analysis_texts.is_empty() {
        analysis_context = format!(
            "\n\nAdditional context from document analysis:\n{}",
            analysis_texts.join("\n\n")
        );
    }

    format!(
        r#"You are an insurance claim extraction system. Extract structured information from the following incident story.

CRITICAL RULES:
1. Return ONLY valid JSON - no markdown, no explanations, no code blocks
2. NEVER invent information - use null or empty arrays if information is not present
3. If confidence is low (< 0.6) or critical fields are missing, set needs_human = true
4. Severity must be one of: "low", "medium", "high"
5. Confidence must be a float between 0 and 1

Required JSON structure:
{{
  "incident_type": "string (e.g., 'car_accident', 'property_damage', 'theft', ...)",
  "severity": "low | medium | high",
  "date": "string (ISO format preferred, or natural language if exact date unknown)",
  "location": "string (address, city, or description)",
  "people_involved": ["array", "of", "names", "or", "descriptions"],
  "documents_detected": ["array", "of", "document", "types", "found"],
  "confidence": 0.0,
  "needs_human": false
}}

Incident story:
{story}{analysis_context}

Return ONLY the JSON object:"#
    )
}

// ── Response parsing ──────────────────────────────────────────────────────────

/// Intermediate shape tolerating partially-wrong model output; the strict
/// record is built with validation applied.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    incident_type: Option<String>,
    severity: Option<String>,
    date: Option<String>,
    location: Option<String>,
    #[serde(default)]
    people_involved: Vec<String>,
    #[serde(default)]
    documents_detected: Vec<String>,
    confidence: Option<f64>,
    needs_human: Option<bool>,
}

fn parse_extraction(content: &str) -> ExtractionRecord {
    let text = strip_fences(content.trim());

    let raw: RawExtraction = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "failed to parse extraction JSON, using safe default");
            return ExtractionRecord::safe_default();
        }
    };

    let mut needs_human = raw.needs_human.unwrap_or(false);

    let severity = match raw.severity.as_deref().map(str::parse::<Severity>) {
        Some(Ok(sev)) => sev,
        _ => {
            needs_human = true;
            Severity::Medium
        }
    };

    let confidence = match raw.confidence {
        Some(c) if (0.0..=1.0).contains(&c) => c,
        Some(c) => {
            needs_human = true;
            c.clamp(0.0, 1.0)
        }
        None => {
            needs_human = true;
            0.0
        }
    };

    let record = ExtractionRecord {
        incident_type: raw.incident_type,
        severity,
        date: raw.date,
        location: raw.location,
        people_involved: raw.people_involved,
        documents_detected: raw.documents_detected,
        confidence,
        needs_human,
    };

    if !record.has_critical_fields() {
        warn!(missing = ?record.missing_fields(), "extraction missing critical fields");
        return ExtractionRecord { needs_human: true, ..record };
    }

    record
}

/// Remove surrounding markdown code fences, if present.
fn strip_fences(text: &str) -> &str {
    let mut t = text;
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

// ── Merge with attachment analysis ────────────────────────────────────────────

/// Merge the text extraction with aggregated attachment analysis: detected
/// documents are unioned, confidence takes the higher of the two sources.
pub fn merge_with_analysis(
    text: &ExtractionRecord,
    documents: &[String],
    analysis_confidence: f64,
) -> ExtractionRecord {
    let mut merged = text.clone();

    for doc in documents {
        if !merged.documents_detected.contains(doc) {
            merged.documents_detected.push(doc.clone());
        }
    }

    if analysis_confidence > 0.0 {
        merged.confidence = merged.confidence.max(analysis_confidence);
    }

    merged
}

// ── Tests ─────────────────────────────────────────────────────────────────────
