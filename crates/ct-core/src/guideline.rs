use serde::{Deserialize, Deserializer, Serialize};

/// An externally sourced reference snippet cited in prompts.
///
/// Missing and null fields fall back to the same defaults regardless of
/// where the snippet came from, so every consumer can format them
/// unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guideline {
    #[serde(default = "default_title", deserialize_with = "title_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub url: String,
    #[serde(default = "default_source", deserialize_with = "source_or_default")]
    pub source: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub published_at: String,
}

fn default_title() -> String {
    "Untitled".to_string()
}

fn default_source() -> String {
    "unknown".to_string()
}

fn title_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_title))
}

fn source_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_source))
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Guideline {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            url: String::new(),
            source: default_source(),
            published_at: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = published_at.into();
        self
    }
}
