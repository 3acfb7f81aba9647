use anyhow::{Context, Result};
use std::io::Write;

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# casetrack configuration
#
# Every setting is optional. Environment overrides:
#   OPENAI_API_KEY, LLM_MODEL, GUIDELINES_BASE_URL
#   CASETRACK_<SECTION>__<KEY>, e.g. CASETRACK_CONTEXT__MAX_CHARS=800

# ── Storage ──────────────────────────────────────────────────────
[database]
# path = "~/.config/casetrack/cases.db"

# ── Language model ───────────────────────────────────────────────
# Without an API key replies are produced in offline mode.
[llm]
# api_key = "sk-..."              # or set OPENAI_API_KEY env var
model = "gpt-4o-mini"
# base_url = "http://localhost:11434/v1"   # any OpenAI-compatible endpoint
timeout_secs = 60
temperature = 0.2

# ── Guidelines ───────────────────────────────────────────────────
# A REST endpoint answering GET ?q=<query>&limit=<n> with a JSON list of
# {title, summary, url, source, published_at}. Leave unset to use the
# built-in demo dataset (or point data_path at your own JSON file).
[guidelines]
# base_url = "https://guidelines.example.org/search"
# data_path = "~/.config/casetrack/guidelines.json"
max_results = 5
timeout_secs = 20

# ── Context summary ──────────────────────────────────────────────
[context]
max_chars = 1200
history_limit = 200
"#;

pub fn run() -> Result<()> {
    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    if config_path.exists() {
        print!(
            "{} already exists. Overwrite? (A backup is kept) [y/N] ",
            config_path.display()
        );
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }

        let backup = config_path.with_extension("toml.bak");
        std::fs::copy(&config_path, &backup)
            .with_context(|| format!("Failed to back up {}", config_path.display()))?;
        println!("Backed up to {}", backup.display());
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Wrote {}", config_path.display());
    Ok(())
}
