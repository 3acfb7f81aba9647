//! One conversational turn for a case: record, summarize, look up guidelines,
//! prompt the model, record the reply.

use std::sync::Arc;

use ct_core::{
    compose, summarize, CaseMeta, CompletionRequest, Error, Guideline, PromptInput, Provider,
    TurnRole,
};
use ct_guidelines::GuidelineClient;
use ct_store::CaseStore;

/// Tunables for a turn, resolved from configuration.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub max_chars: usize,
    pub history_limit: usize,
    pub max_guidelines: usize,
    pub model: Option<String>,
    pub temperature: f32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_chars: ct_core::DEFAULT_MAX_CHARS,
            history_limit: ct_store::DEFAULT_HISTORY_LIMIT,
            max_guidelines: 5,
            model: None,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub guidelines: Vec<Guideline>,
    pub summary: String,
    /// Set when the guideline lookup failed and the turn went ahead without it.
    pub guideline_error: Option<String>,
}

pub struct CaseAssistant {
    store: CaseStore,
    guidelines: GuidelineClient,
    provider: Arc<dyn Provider>,
    settings: TurnSettings,
}

impl CaseAssistant {
    pub fn new(
        store: CaseStore,
        guidelines: GuidelineClient,
        provider: Arc<dyn Provider>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            store,
            guidelines,
            provider,
            settings,
        }
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Current context summary for a case, as the next prompt would see it.
    pub fn summary(&self, case_id: &str, max_chars: usize) -> Result<String, Error> {
        let history = self.store.history(case_id, self.settings.history_limit)?;
        Ok(summarize(&history, max_chars))
    }

    pub async fn respond(&self, case_id: &str, user_input: &str) -> Result<TurnOutcome, Error> {
        self.store.get_or_create_case(case_id)?;
        self.store.save_message(case_id, TurnRole::User, user_input)?;

        let history = self.store.history(case_id, self.settings.history_limit)?;
        let summary = summarize(&history, self.settings.max_chars);
        tracing::debug!(
            case_id,
            turns = history.len(),
            summary_len = summary.chars().count(),
            "Built context summary"
        );

        let meta = self.store.case_meta(case_id)?.unwrap_or_default();
        let query = guideline_query(&meta, user_input);

        let (guidelines, guideline_error) = match self
            .guidelines
            .search(&query, self.settings.max_guidelines)
            .await
        {
            Ok(found) => (found, None),
            Err(e) => {
                tracing::warn!(case_id, error = %e, "Guidelines lookup failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let prompt = compose(&PromptInput {
            user_input,
            context_summary: &summary,
            guidelines: &guidelines,
            meta: &meta,
            now: chrono::Utc::now(),
        });

        let mut request = CompletionRequest::new(prompt.into_messages())
            .with_temperature(self.settings.temperature);
        if let Some(model) = &self.settings.model {
            request = request.with_model(model.as_str());
        }

        let reply = match self.provider.complete(request).await {
            Ok(response) => {
                tracing::info!(
                    case_id,
                    provider = self.provider.name(),
                    model = %response.model,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "Completion finished"
                );
                response.content
            }
            Err(e) => {
                tracing::warn!(case_id, provider = self.provider.name(), error = %e, "Completion failed");
                format!("LLM error: {}", e)
            }
        };

        self.store.save_message(case_id, TurnRole::Assistant, &reply)?;

        Ok(TurnOutcome {
            reply,
            guidelines,
            summary,
            guideline_error,
        })
    }
}

/// Guideline query: the case domain (when set) and the user's message,
/// joined with `" | "`.
pub fn guideline_query(meta: &CaseMeta, user_input: &str) -> String {
    [meta.domain(), Some(user_input)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ct_core::testing::MockProvider;
    use ct_core::Role;
    use ct_guidelines::DemoGuidelines;

    fn assistant(provider: Arc<MockProvider>, guidelines: GuidelineClient) -> CaseAssistant {
        CaseAssistant::new(
            CaseStore::in_memory().unwrap(),
            guidelines,
            provider,
            TurnSettings {
                model: Some("gpt-4o-mini".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_guideline_query() {
        let meta = CaseMeta {
            domain: Some("hypertension".to_string()),
            ..Default::default()
        };
        assert_eq!(guideline_query(&meta, "BP 152/94"), "hypertension | BP 152/94");
        assert_eq!(guideline_query(&CaseMeta::default(), "BP 152/94"), "BP 152/94");
        assert_eq!(guideline_query(&meta, ""), "hypertension");
    }

    #[tokio::test]
    async fn test_respond_records_both_turns() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("Let's review your readings.");
        let assistant = assistant(provider.clone(), GuidelineClient::Demo(DemoGuidelines::bundled()));

        let outcome = assistant
            .respond("case1", "I need help with hypertension management.")
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Let's review your readings.");
        assert!(outcome.guideline_error.is_none());
        assert!(!outcome.guidelines.is_empty());
        assert!(outcome
            .summary
            .contains("Initial user intent: I need help with hypertension management."));

        let history = assistant.store().history("case1", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].content, "Let's review your readings.");
    }

    #[tokio::test]
    async fn test_prompt_carries_summary_meta_and_guidelines() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("first reply");
        provider.queue_response("second reply");
        let assistant = assistant(provider.clone(), GuidelineClient::Demo(DemoGuidelines::bundled()));

        assistant.store().get_or_create_case("c").unwrap();
        assistant
            .store()
            .set_case_meta(
                "c",
                &CaseMeta {
                    user_name: Some("Sam".to_string()),
                    domain: Some("hypertension".to_string()),
                    goal: None,
                },
            )
            .unwrap();

        assistant.respond("c", "Average BP 152/94").await.unwrap();
        assistant.respond("c", "On amlodipine").await.unwrap();

        let request = provider.last_request().unwrap();
        assert_eq!(request.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);

        let user = &request.messages[1].content;
        assert!(user.contains("User name: Sam\nDomain: hypertension"));
        assert!(user.contains("Latest assistant advice: first reply"));
        assert!(user.contains("user: On amlodipine"));
        assert!(user.contains("[G1] "));
        assert!(user.ends_with("\"\"\"\nOn amlodipine\n\"\"\""));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_reply() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::auth("Incorrect API key provided"));
        let assistant = assistant(provider, GuidelineClient::Demo(DemoGuidelines::bundled()));

        let outcome = assistant.respond("c", "hello").await.unwrap();
        assert_eq!(
            outcome.reply,
            "LLM error: Authentication error: Incorrect API key provided"
        );
        let history = assistant.store().history("c", 10).unwrap();
        assert_eq!(history[1].content, outcome.reply);
    }

    #[tokio::test]
    async fn test_guideline_failure_does_not_abort_turn() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("ok");
        let guidelines = GuidelineClient::from_settings(
            None,
            Some("/nonexistent/guidelines.json".into()),
            Duration::from_secs(1),
        );
        let assistant = assistant(provider.clone(), guidelines);

        let outcome = assistant.respond("c", "hello").await.unwrap();
        assert_eq!(outcome.reply, "ok");
        assert!(outcome.guidelines.is_empty());
        assert!(outcome.guideline_error.is_some());

        let user = provider.last_request().unwrap().messages[1].content.clone();
        assert!(user.contains("No external guidelines available."));
    }

    #[tokio::test]
    async fn test_long_case_summarizes_latest_turns() {
        let provider = Arc::new(MockProvider::new());
        for i in 1..=4 {
            provider.queue_response(&format!("reply {}", i));
        }
        let assistant = CaseAssistant::new(
            CaseStore::in_memory().unwrap(),
            GuidelineClient::Demo(DemoGuidelines::bundled()),
            provider,
            TurnSettings {
                history_limit: 4,
                ..Default::default()
            },
        );

        for i in 1..=3 {
            assistant
                .respond("c", &format!("question {}", i))
                .await
                .unwrap();
        }
        let outcome = assistant.respond("c", "question LATEST").await.unwrap();

        assert!(outcome.summary.contains("Initial user intent: question 3"));
        assert!(outcome.summary.contains("Latest assistant advice: reply 3"));
        assert!(outcome.summary.ends_with("user: question LATEST"));
        assert!(!outcome.summary.contains("question 1"));

        let summary = assistant.summary("c", 1200).unwrap();
        assert!(summary.contains("Latest assistant advice: reply 4"));
        assert!(summary.ends_with("assistant: reply 4"));
    }

    #[tokio::test]
    async fn test_summary_uses_requested_budget() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("Sure, let's start with your latest readings.");
        let assistant = assistant(provider, GuidelineClient::Demo(DemoGuidelines::bundled()));
        assistant
            .respond("c", "I need help with hypertension management.")
            .await
            .unwrap();

        let full = assistant.summary("c", 1200).unwrap();
        assert!(full.contains("Recent exchanges:\nuser: I need help"));
        assert_eq!(assistant.summary("c", 10).unwrap(), ct_core::TRUNCATION_MARKER);
        assert_eq!(assistant.summary("empty", 1200).unwrap(), "");
    }
}
