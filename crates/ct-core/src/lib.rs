//! ct-core: Core types and traits for casetrack
//!
//! This crate provides the conversation types, the history-to-context
//! summarizer and the prompt composer shared by the casetrack crates.

pub mod context;
pub mod error;
pub mod guideline;
pub mod message;
pub mod prompt;
pub mod provider;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::{normalize, summarize, DEFAULT_MAX_CHARS, RECENT_WINDOW, TRUNCATION_MARKER};
pub use error::Error;
pub use guideline::Guideline;
pub use message::{CaseMeta, Message, Role, Turn, TurnRole};
pub use prompt::{compose, ComposedPrompt, PromptInput, SYSTEM_CORE};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};

pub type Result<T> = std::result::Result<T, Error>;
