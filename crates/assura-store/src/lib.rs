//! assura-store — Persistence gateway for incidents, timeline events, and
//! attachment metadata.
//!
//! The pipeline and web layer see only the `IncidentStore` trait; the
//! concrete gateway (in-memory or Postgres) is selected once at startup.

pub mod gateway;
pub mod memory;
pub mod postgres;

pub use gateway::{IncidentStore, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
