//! Offline fallback used when no API key is configured.
//!
//! Produces a deterministic reply built from the prompt itself so the whole
//! case flow (storage, summary, guidelines, prompt) can be exercised without
//! network access.

use async_trait::async_trait;

use ct_core::{CompletionRequest, CompletionResponse, Error, Provider, Usage};

/// Number of prompt characters echoed back in the offline reply.
const ECHO_CHARS: usize = 400;

#[derive(Debug, Clone, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }

    fn reply(&self, user_prompt: &str) -> String {
        let echoed: String = user_prompt.chars().take(ECHO_CHARS).collect();
        format!(
            "⚠️ Running in offline mode (no API key).\n\n\
             Here's a structured response based on your inputs:\n\n\
             **Understanding**: {}...\n\n\
             **Next steps**: 1) Provide an API key in the config. 2) Set a model. 3) Re-run the message.",
            echoed
        )
    }
}

#[async_trait]
impl Provider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn default_model(&self) -> Option<&str> {
        None
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let prompt = request.last_user_content().unwrap_or_default();
        tracing::debug!(prompt_len = prompt.len(), "Offline provider reply");

        Ok(CompletionResponse {
            content: self.reply(prompt),
            model: "offline".to_string(),
            usage: Usage::default(),
        })
    }
}
