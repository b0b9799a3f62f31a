//! assura-web — HTTP surface for the incident backend.
//! Provides:
//!   - POST /incident            (multipart submission)
//!   - GET  /incident/{id}       (owner-scoped, decrypted view + timeline)
//!   - POST /incident/{id}/close (external close action)
//!   - DELETE /incident/{id}     (explicit cascade delete)
//!   - GET  /health              (liveness)

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
