//! ct-guidelines: Guideline lookup for casetrack
//!
//! A lookup is either served from a local fixture ([`DemoGuidelines`]) or
//! from a REST endpoint ([`RestGuidelines`]). [`GuidelineClient`] picks one
//! from configuration.

pub mod demo;
pub mod rest;

use std::path::PathBuf;
use std::time::Duration;

pub use ct_core::Guideline;
use ct_core::Error;

pub use demo::DemoGuidelines;
pub use rest::RestGuidelines;

/// Upper bound accepted for `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 20;

pub enum GuidelineClient {
    Demo(DemoGuidelines),
    Rest(RestGuidelines),
}

impl GuidelineClient {
    /// Select a client: a non-blank base URL means REST, otherwise the demo
    /// dataset (from `data_path`, or the bundled sample).
    pub fn from_settings(
        base_url: Option<&str>,
        data_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => GuidelineClient::Rest(RestGuidelines::new(url).with_timeout(timeout)),
            None => GuidelineClient::Demo(match data_path {
                Some(path) => DemoGuidelines::from_path(path),
                None => DemoGuidelines::bundled(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GuidelineClient::Demo(_) => "demo",
            GuidelineClient::Rest(_) => "rest",
        }
    }

    /// Search for up to `max_results` guidelines, clamped to
    /// `1..=MAX_RESULTS_LIMIT`.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Guideline>, Error> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        tracing::debug!(client = self.name(), query, max_results, "Guideline search");

        match self {
            GuidelineClient::Demo(demo) => demo.search(query, max_results).await,
            GuidelineClient::Rest(rest) => rest.search(query, max_results).await,
        }
    }
}
