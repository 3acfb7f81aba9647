//! REST guideline lookup.
//!
//! The endpoint must answer `GET <base_url>?q=<query>&limit=<n>` with a JSON
//! array of `{title, summary, url, source, published_at}` objects.

use std::time::Duration;

use reqwest::Client;

use ct_core::{Error, Guideline};

const DEFAULT_TIMEOUT_SECS: u64 = 20;

pub struct RestGuidelines {
    client: Client,
    base_url: String,
}

impl RestGuidelines {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Guideline>, Error> {
        let limit = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("Guidelines request timed out: {}", e))
                } else {
                    Error::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), body));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;

        parse_items(data, max_results)
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("casetrack/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

fn parse_items(data: serde_json::Value, max_results: usize) -> Result<Vec<Guideline>, Error> {
    let serde_json::Value::Array(items) = data else {
        return Err(Error::guidelines("Guidelines API must return a JSON list."));
    };

    items
        .into_iter()
        .take(max_results)
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}
