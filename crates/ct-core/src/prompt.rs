//! Prompt composition: case metadata, context summary and guideline snippets
//! stitched into a system/user prompt pair.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::guideline::Guideline;
use crate::message::{CaseMeta, Message};

/// Guideline entries beyond this count are left out of the prompt.
pub const MAX_PROMPT_GUIDELINES: usize = 10;

pub const SYSTEM_CORE: &str = "You are an agentic assistant helping to track and advance a case.
You must:
- Be context-aware: reference earlier user inputs and assistant responses
- Cite external guideline snippets that were provided in your context
- Be concise but actionable
- If information is uncertain, say so and suggest how to verify it
- Never fabricate URLs or guideline names that were not given
";

/// Everything the composer needs for one turn.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub user_input: &'a str,
    pub context_summary: &'a str,
    pub guidelines: &'a [Guideline],
    pub meta: &'a CaseMeta,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

impl ComposedPrompt {
    pub fn into_messages(self) -> Vec<Message> {
        vec![Message::system(self.system), Message::user(self.user)]
    }
}

pub fn compose(input: &PromptInput<'_>) -> ComposedPrompt {
    let timestamp = input.now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let user = format!(
        "Timestamp: {timestamp}

Case metadata:
{meta}

Context summary from earlier messages:
{summary}

External guidelines and references (read-only context):
{guidelines}

Task:
1) Respond to the user's latest message below.
2) Reference any relevant [G#] entries in your reasoning (e.g., \"Per [G2] ...\").
3) Tailor your response to the user's prior inputs in this case.
4) Provide next steps and, if relevant, questions to clarify.

Latest user message:
\"\"\"
{input}
\"\"\"",
        meta = meta_block(input.meta),
        summary = input.context_summary,
        guidelines = guideline_block(input.guidelines),
        input = input.user_input,
    );

    ComposedPrompt {
        system: SYSTEM_CORE.to_string(),
        user: user.trim().to_string(),
    }
}

fn meta_block(meta: &CaseMeta) -> String {
    let mut lines = Vec::new();
    if let Some(name) = meta.user_name() {
        lines.push(format!("User name: {}", name));
    }
    if let Some(domain) = meta.domain() {
        lines.push(format!("Domain: {}", domain));
    }
    if let Some(goal) = meta.goal() {
        lines.push(format!("Goal: {}", goal));
    }

    if lines.is_empty() {
        "(no case metadata provided)".to_string()
    } else {
        lines.join("\n")
    }
}

fn guideline_block(guidelines: &[Guideline]) -> String {
    if guidelines.is_empty() {
        return "No external guidelines available.".to_string();
    }

    guidelines
        .iter()
        .take(MAX_PROMPT_GUIDELINES)
        .enumerate()
        .map(|(i, g)| {
            format!(
                "[G{}] {} — {} ({})\n{}\n{}",
                i + 1,
                g.title,
                g.source,
                g.published_at,
                g.summary,
                g.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap()
    }

    #[test]
    fn test_compose_without_meta_or_guidelines() {
        let meta = CaseMeta::default();
        let prompt = compose(&PromptInput {
            user_input: "What next?",
            context_summary: "Recent exchanges:\nuser: hi",
            guidelines: &[],
            meta: &meta,
            now: fixed_now(),
        });

        assert_eq!(prompt.system, SYSTEM_CORE);
        assert!(prompt.user.starts_with("Timestamp: 2024-03-01T09:30:15Z\n"));
        assert!(prompt.user.contains("Case metadata:\n(no case metadata provided)"));
        assert!(prompt
            .user
            .contains("Context summary from earlier messages:\nRecent exchanges:\nuser: hi"));
        assert!(prompt.user.contains("No external guidelines available."));
        assert!(prompt.user.ends_with("\"\"\"\nWhat next?\n\"\"\""));
    }

    #[test]
    fn test_compose_with_meta() {
        let meta = CaseMeta {
            user_name: Some("Sam".to_string()),
            domain: Some("clinical triage".to_string()),
            goal: Some(String::new()),
        };
        let prompt = compose(&PromptInput {
            user_input: "hello",
            context_summary: "",
            guidelines: &[],
            meta: &meta,
            now: fixed_now(),
        });

        assert!(prompt
            .user
            .contains("Case metadata:\nUser name: Sam\nDomain: clinical triage\n\n"));
        assert!(!prompt.user.contains("Goal:"));
    }

    #[test]
    fn test_guidelines_are_numbered_and_capped() {
        let guidelines: Vec<Guideline> = (1..=12)
            .map(|i| {
                Guideline::new(format!("Title {}", i), format!("Summary {}", i))
                    .with_source("WHO")
                    .with_url(format!("https://example.org/{}", i))
                    .with_published_at("2021")
            })
            .collect();
        let meta = CaseMeta::default();
        let prompt = compose(&PromptInput {
            user_input: "hello",
            context_summary: "",
            guidelines: &guidelines,
            meta: &meta,
            now: fixed_now(),
        });

        assert!(prompt
            .user
            .contains("[G1] Title 1 — WHO (2021)\nSummary 1\nhttps://example.org/1\n\n[G2]"));
        assert!(prompt.user.contains("[G10] Title 10"));
        assert!(!prompt.user.contains("[G11]"));
    }

    #[test]
    fn test_into_messages() {
        let meta = CaseMeta::default();
        let messages = compose(&PromptInput {
            user_input: "hello",
            context_summary: "",
            guidelines: &[],
            meta: &meta,
            now: fixed_now(),
        })
        .into_messages();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::Role::System);
        assert_eq!(messages[1].role, crate::Role::User);
    }
}
