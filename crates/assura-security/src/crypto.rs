//! Field-level encryption gate.
//!
//! A single policy flag, resolved once at process start, selects between
//! real AES-256-GCM and an identity transform. Both implement `FieldCipher`,
//! so callers never branch on the policy themselves.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use assura_common::ExtractionRecord;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Symmetric transform applied to individual field values.
///
/// The real transform and the identity transform are exact inverses of
/// themselves: `decrypt(encrypt(v)) == v` always, and when inactive
/// `encrypt(v) == v` exactly.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, value: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, value: &str) -> Result<String, CryptoError>;
    fn is_active(&self) -> bool;
}

/// AES-256-GCM with a random 96-bit nonce prepended to the ciphertext;
/// the whole blob is base64 for transport and storage.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh base64-encoded key.
    pub fn generate_key() -> String {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }
}

impl FieldCipher for AesGcmCipher {
    fn encrypt(&self, value: &str) -> Result<String, CryptoError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        let blob = BASE64.decode(value)?;
        if blob.len() < 12 {
            return Err(CryptoError::Decrypt);
        }
        let (nonce, ciphertext) = blob.split_at(12);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Identity transform used when the encryption policy is off.
pub struct NoopCipher;

impl FieldCipher for NoopCipher {
    fn encrypt(&self, value: &str) -> Result<String, CryptoError> {
        Ok(value.to_string())
    }

    fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        Ok(value.to_string())
    }

    fn is_active(&self) -> bool {
        false
    }
}

/// Applies the configured cipher to named fields of a record.
#[derive(Clone)]
pub struct EncryptionGate {
    cipher: Arc<dyn FieldCipher>,
}

impl EncryptionGate {
    pub fn new(cipher: Arc<dyn FieldCipher>) -> Self {
        Self { cipher }
    }

    /// Gate with the identity transform.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCipher))
    }

    pub fn is_active(&self) -> bool {
        self.cipher.is_active()
    }

    pub fn encrypt_field(&self, value: &str) -> Result<String, CryptoError> {
        self.cipher.encrypt(value)
    }

    pub fn decrypt_field(&self, value: &str) -> Result<String, CryptoError> {
        self.cipher.decrypt(value)
    }

    /// Encrypt the named fields of an extraction record. String fields are
    /// encrypted in place; string-array fields element-wise. Unknown names
    /// and non-string values are left untouched.
    pub fn encrypt_fields(
        &self,
        record: &ExtractionRecord,
        fields: &[String],
    ) -> Result<ExtractionRecord, CryptoError> {
        self.transform_fields(record, fields, true)
    }

    /// Exact inverse of `encrypt_fields`.
    pub fn decrypt_fields(
        &self,
        record: &ExtractionRecord,
        fields: &[String],
    ) -> Result<ExtractionRecord, CryptoError> {
        self.transform_fields(record, fields, false)
    }

    fn transform_fields(
        &self,
        record: &ExtractionRecord,
        fields: &[String],
        encrypt: bool,
    ) -> Result<ExtractionRecord, CryptoError> {
        let mut value = serde_json::to_value(record)?;
        if let Some(map) = value.as_object_mut() {
            for field in fields {
                let Some(entry) = map.get_mut(field) else { continue };
                match entry {
                    serde_json::Value::String(s) => {
                        *s = self.apply(s, encrypt)?;
                    }
                    serde_json::Value::Array(items) => {
                        for item in items {
                            if let serde_json::Value::String(s) = item {
                                *s = self.apply(s, encrypt)?;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    fn apply(&self, value: &str, encrypt: bool) -> Result<String, CryptoError> {
        if encrypt {
            self.cipher.encrypt(value)
        } else {
            self.cipher.decrypt(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assura_common::Severity;

    fn sample_record() -> ExtractionRecord {
        ExtractionRecord {
            incident_type: Some("car_accident".to_string()),
            severity: Severity::Medium,
            date: Some("2024-01-15".to_string()),
            location: Some("123 Main Street".to_string()),
            people_involved: vec!["the other driver".to_string()],
            documents_detected: vec!["police_report".to_string()],
            confidence: 0.85,
            needs_human: false,
        }
    }

    fn protected() -> Vec<String> {
        vec![
            "date".to_string(),
            "location".to_string(),
            "people_involved".to_string(),
        ]
    }

    #[test]
    fn test_round_trip_exact() {
        let key = AesGcmCipher::generate_key();
        let gate = EncryptionGate::new(Arc::new(AesGcmCipher::from_base64_key(&key).unwrap()));
        let record = sample_record();
        let encrypted = gate.encrypt_fields(&record, &protected()).unwrap();
        assert_ne!(encrypted.location, record.location);
        assert_ne!(encrypted.people_involved, record.people_involved);
        // untouched fields stay intact
        assert_eq!(encrypted.incident_type, record.incident_type);
        assert_eq!(encrypted.confidence, record.confidence);
        let decrypted = gate.decrypt_fields(&encrypted, &protected()).unwrap();
        assert_eq!(decrypted, record);
    }

    #[test]
    fn test_noop_is_exact_identity() {
        let gate = EncryptionGate::disabled();
        let record = sample_record();
        assert_eq!(gate.encrypt_fields(&record, &protected()).unwrap(), record);
        assert_eq!(gate.encrypt_field("hello").unwrap(), "hello");
        assert!(!gate.is_active());
    }

    #[test]
    fn test_empty_value_passes_through() {
        let key = AesGcmCipher::generate_key();
        let cipher = AesGcmCipher::from_base64_key(&key).unwrap();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
    }

    #[test]
    fn test_wrong_key_fails_decrypt() {
        let a = AesGcmCipher::from_base64_key(&AesGcmCipher::generate_key()).unwrap();
        let b = AesGcmCipher::from_base64_key(&AesGcmCipher::generate_key()).unwrap();
        let ciphertext = a.encrypt("secret").unwrap();
        assert!(matches!(b.decrypt(&ciphertext), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(AesGcmCipher::from_base64_key("not base64!!!").is_err());
        assert!(AesGcmCipher::from_base64_key(&BASE64.encode([0u8; 16])).is_err());
    }

    #[test]
    fn test_field_encryption_preserves_emptiness() {
        let key = AesGcmCipher::generate_key();
        let gate = EncryptionGate::new(Arc::new(AesGcmCipher::from_base64_key(&key).unwrap()));
        let mut record = sample_record();
        record.location = Some(String::new());
        record.date = None;
        let encrypted = gate.encrypt_fields(&record, &protected()).unwrap();
        assert_eq!(encrypted.location.as_deref(), Some(""));
        assert_eq!(encrypted.date, None);
    }
}
