use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment variables honoured without the `CASETRACK_` prefix.
const CONVENTIONAL_ENV: [(&str, &str); 3] = [
    ("OPENAI_API_KEY", "llm.api_key"),
    ("LLM_MODEL", "llm.model"),
    ("GUIDELINES_BASE_URL", "guidelines.base_url"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub guidelines: GuidelinesConfig,
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the case database (supports $HOME, ~)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Leave unset to run in offline mode
    pub api_key: Option<String>,
    pub model: String,
    /// OpenAI-compatible endpoint (defaults to api.openai.com)
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_secs: 60,
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    /// The API key, if one is set to something other than whitespace.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidelinesConfig {
    /// REST endpoint; when unset the demo dataset is used
    pub base_url: Option<String>,
    /// JSON dataset for the demo client (bundled sample when unset)
    pub data_path: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for GuidelinesConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            data_path: None,
            max_results: 5,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Character budget for the context summary
    pub max_chars: usize,
    /// Number of stored turns loaded per case
    pub history_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: ct_core::DEFAULT_MAX_CHARS,
            history_limit: ct_store::DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    // Expand ~ at the start
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    // Expand $VAR and ${VAR}
    let re = match regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?") {
        Ok(re) => re,
        Err(_) => return PathBuf::from(result),
    };
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

impl Config {
    /// Load defaults, then the config file (if present), then environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let config: Config = Self::figment(&config_path)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(config_path: &Path) -> Figment {
        let conventional = Env::raw()
            .only(&CONVENTIONAL_ENV.map(|(var, _)| var))
            .map(|key| {
                CONVENTIONAL_ENV
                    .iter()
                    .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                    .map(|(_, path)| (*path).into())
                    .unwrap_or_else(|| key.into())
            });

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(conventional)
            .merge(Env::prefixed("CASETRACK_").split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.context.max_chars == 0 {
            anyhow::bail!("context.max_chars must be a positive integer");
        }
        if self.context.history_limit == 0 {
            anyhow::bail!("context.history_limit must be a positive integer");
        }
        if self.llm.timeout_secs == 0 || self.guidelines.timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("casetrack"))
    }

    /// Database path: config > ~/.config/casetrack/cases.db
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(expand_path(path)),
            None => Ok(Self::config_dir()?.join("cases.db")),
        }
    }

    pub fn guidelines_data_path(&self) -> Option<PathBuf> {
        self.guidelines.data_path.as_deref().map(expand_path)
    }

    /// Copy of the configuration safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.api_key().is_some() {
            config.llm.api_key = Some("(configured)".to_string());
        }
        config
    }
}
