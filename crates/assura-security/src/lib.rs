//! assura-security — PII pseudonymization and field-level encryption.
//! Personal identifiers are replaced with stable pseudonyms before any text
//! leaves the process; sensitive fields are encrypted at rest behind a
//! policy fixed at startup.

pub mod crypto;
pub mod pii;

pub use crypto::{AesGcmCipher, CryptoError, EncryptionGate, FieldCipher, NoopCipher};
pub use pii::{is_pii_field, pseudonymize, restore};
