//! Offline guideline lookup backed by a small JSON dataset.

use std::cmp::Reverse;
use std::path::PathBuf;

use ct_core::{Error, Guideline};

const BUNDLED_DATASET: &str = include_str!("../data/sample_guidelines.json");

enum Dataset {
    Bundled,
    File(PathBuf),
}

pub struct DemoGuidelines {
    dataset: Dataset,
}

impl DemoGuidelines {
    /// Use the sample dataset shipped with this crate.
    pub fn bundled() -> Self {
        Self {
            dataset: Dataset::Bundled,
        }
    }

    /// Use a JSON array of guidelines stored at `path`. The file is read on
    /// every search so edits show up without a restart.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            dataset: Dataset::File(path.into()),
        }
    }

    async fn load(&self) -> Result<Vec<Guideline>, Error> {
        let raw = match &self.dataset {
            Dataset::Bundled => BUNDLED_DATASET.to_string(),
            Dataset::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::guidelines(format!("Failed to read {}: {}", path.display(), e))
            })?,
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Guideline>, Error> {
        let items = self.load().await?;
        let query = query.to_lowercase();

        let mut scored: Vec<(usize, Guideline)> = items
            .into_iter()
            .map(|g| (score(&query, &g), g))
            .collect();
        // Stable: equal scores keep dataset order.
        scored.sort_by_key(|(s, _)| Reverse(*s));

        Ok(scored
            .into_iter()
            .take(max_results)
            .map(|(_, g)| g)
            .collect())
    }
}

/// Naive keyword ranking: one point if the whole query appears in the title
/// or summary, plus one per query token that appears there.
fn score(query: &str, guideline: &Guideline) -> usize {
    let text = format!("{} {}", guideline.title, guideline.summary).to_lowercase();
    let whole = usize::from(text.contains(query));
    let tokens = query
        .split_whitespace()
        .filter(|token| text.contains(token))
        .count();
    whole + tokens
}
