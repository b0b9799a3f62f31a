//! PII pseudonymization.
//!
//! Detectable identifiers are replaced with stable `[KIND_N]` tokens and a
//! pseudonym → original mapping is returned for later restoration. The
//! transform is total: text with no detectable identifiers passes through
//! unchanged, and unmatched identifiers are left as-is.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pattern order is fixed so pseudonym numbering is deterministic.
    static ref PII_PATTERNS: Vec<(&'static str, Regex)> = vec![
        (
            "EMAIL",
            Regex::new(r"(?i)\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
        ),
        (
            "PHONE",
            Regex::new(r"\b(?:\+?1[-.]?)?\(?[0-9]{3}\)?[-.]?[0-9]{3}[-.]?[0-9]{4}\b").unwrap(),
        ),
        ("SSN", Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()),
        (
            "CREDIT_CARD",
            Regex::new(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b").unwrap(),
        ),
        ("IP", Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap()),
    ];
}

/// Field names whose values are treated as personal data when found in a
/// structured record.
const PII_FIELD_NAMES: &[&str] = &[
    "email",
    "phone",
    "ssn",
    "social_security",
    "address",
    "location",
    "date",
    "name",
    "people",
    "license",
    "policy",
    "credit_card",
    "account",
];

/// Replace detectable identifiers with pseudonyms.
///
/// Returns the redacted text and a map keyed by pseudonym. Repeated
/// occurrences of the same identifier share one pseudonym.
pub fn pseudonymize(text: &str) -> (String, HashMap<String, String>) {
    let mut map: HashMap<String, String> = HashMap::new();
    let mut assigned: HashMap<String, String> = HashMap::new();
    let mut redacted = text.to_string();
    let mut counter = 1usize;

    for (kind, pattern) in PII_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let original = m.as_str();
            if !assigned.contains_key(original) {
                let pseudonym = format!("[{}_{}]", kind, counter);
                counter += 1;
                map.insert(pseudonym.clone(), original.to_string());
                assigned.insert(original.to_string(), pseudonym);
            }
            let pseudonym = &assigned[original];
            redacted = redacted.replacen(original, pseudonym, 1);
        }
    }

    (redacted, map)
}

/// Restore original identifiers using the pseudonym map.
pub fn restore(text: &str, map: &HashMap<String, String>) -> String {
    let mut restored = text.to_string();
    for (pseudonym, original) in map {
        restored = restored.replace(pseudonym.as_str(), original);
    }
    restored
}

/// Whether a structured field name is considered PII-bearing, used to pick
/// the fields the encryption gate protects.
pub fn is_pii_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    PII_FIELD_NAMES.iter().any(|pii| lower.contains(pii))
}
