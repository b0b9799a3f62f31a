//! assura-llm — LLM backend abstraction and the incident extraction adapter.
//!
//! Backends speak to an external chat-completion API; the extractor turns
//! free-text incident stories into structured records with a mandatory
//! safe-default fallback on any upstream failure.

pub mod backend;
pub mod extractor;

pub use backend::{AnthropicBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OpenAiCompatibleBackend};
pub use extractor::{merge_with_analysis, IncidentExtractor};
