//! ct-providers: LLM provider implementations for casetrack
//!
//! This crate provides implementations of the Provider trait: an
//! OpenAI-compatible chat completions client and an offline fallback.

pub mod offline;
pub mod openai;

pub use offline::OfflineProvider;
pub use openai::OpenAIProvider;
