use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ct_core::{CaseMeta, Provider};
use ct_guidelines::GuidelineClient;
use ct_providers::{OfflineProvider, OpenAIProvider};
use ct_store::CaseStore;

mod chat;
mod config;
mod setup;
mod turn;

use config::Config;
use turn::{CaseAssistant, TurnSettings};

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: everything including request details
    Trace,
    /// Verbose: summaries, guideline queries, provider requests
    Debug,
    /// Standard: case creation, completed turns
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "ct")]
#[command(author, version, about = "Casetrack: context-aware case assistant", long_about = None)]
pub struct Cli {
    /// Case database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new case
    New,
    /// List existing cases, newest first
    Cases {
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Start an interactive conversation (creates a case when none is given)
    Chat {
        case_id: Option<String>,
        /// Print guideline results after each reply
        #[arg(short, long)]
        guidelines: bool,
    },
    /// Send a single message to a case and print the reply
    Ask {
        case_id: String,
        message: String,
        /// Print guideline results before the reply
        #[arg(short, long)]
        guidelines: bool,
    },
    /// Show a case's conversation
    History {
        case_id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the context summary the next prompt would use
    Summary {
        case_id: String,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Show case metadata, or set it when any field is given
    Meta {
        case_id: String,
        #[arg(long)]
        user_name: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        goal: Option<String>,
    },
    /// Show current configuration
    Config,
    /// Write a configuration template to ~/.config/casetrack
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Handle setup before config is required
    if matches!(&cli.command, Some(Commands::Setup)) {
        return setup::run();
    }

    let mut config = Config::load()?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }

    if matches!(&cli.command, Some(Commands::Config)) {
        return show_config(&config);
    }

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config.database_path()?,
    };
    let store = CaseStore::open(&db_path)
        .with_context(|| format!("Failed to open case database {}", db_path.display()))?;

    match cli.command {
        Some(Commands::New) => {
            let case_id = new_case_id();
            store.get_or_create_case(&case_id)?;
            println!("{}", case_id);
            Ok(())
        }
        Some(Commands::Cases { limit }) => list_cases(&store, limit),
        Some(Commands::History { case_id, json }) => {
            let turns = store.history(&case_id, config.context.history_limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&turns)?);
            } else {
                chat::print_history(&turns);
            }
            Ok(())
        }
        Some(Commands::Meta {
            case_id,
            user_name,
            domain,
            goal,
        }) => update_meta(&store, &case_id, user_name, domain, goal),
        Some(Commands::Summary { case_id, max_chars }) => {
            let assistant = build_assistant(&config, store);
            let max_chars = max_chars.unwrap_or(config.context.max_chars);
            if max_chars == 0 {
                anyhow::bail!("--max-chars must be a positive integer");
            }
            println!("{}", assistant.summary(&case_id, max_chars)?);
            Ok(())
        }
        Some(Commands::Ask {
            case_id,
            message,
            guidelines,
        }) => {
            let assistant = build_assistant(&config, store);
            let outcome = assistant.respond(&case_id, &message).await?;
            if let Some(err) = &outcome.guideline_error {
                eprintln!("Warning: guidelines lookup failed: {}", err);
            }
            if guidelines {
                chat::print_guidelines(&outcome.guidelines);
            }
            println!("{}", outcome.reply);
            Ok(())
        }
        Some(Commands::Chat {
            case_id,
            guidelines,
        }) => {
            let case_id = case_id.unwrap_or_else(new_case_id);
            let assistant = build_assistant(&config, store);
            chat::run_chat(&assistant, &case_id, guidelines).await
        }
        None => {
            let assistant = build_assistant(&config, store);
            chat::run_chat(&assistant, &new_case_id(), false).await
        }
        // Handled before the store is opened
        Some(Commands::Config) | Some(Commands::Setup) => Ok(()),
    }
}

/// Short case identifier: the first 8 hex digits of a v4 UUID.
fn new_case_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn create_provider(config: &Config) -> Arc<dyn Provider> {
    match config.llm.api_key() {
        Some(api_key) => {
            let mut provider = OpenAIProvider::new(api_key)
                .with_default_model(&config.llm.model)
                .with_timeout(Duration::from_secs(config.llm.timeout_secs));
            if let Some(url) = &config.llm.base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        None => {
            tracing::info!("No API key configured; using offline mode");
            Arc::new(OfflineProvider::new())
        }
    }
}

fn build_assistant(config: &Config, store: CaseStore) -> CaseAssistant {
    let guidelines = GuidelineClient::from_settings(
        config.guidelines.base_url.as_deref(),
        config.guidelines_data_path(),
        Duration::from_secs(config.guidelines.timeout_secs),
    );
    tracing::debug!(client = guidelines.name(), "Guideline client selected");

    let settings = TurnSettings {
        max_chars: config.context.max_chars,
        history_limit: config.context.history_limit,
        max_guidelines: config.guidelines.max_results,
        model: Some(config.llm.model.clone()),
        temperature: config.llm.temperature,
    };

    CaseAssistant::new(store, guidelines, create_provider(config), settings)
}

fn list_cases(store: &CaseStore, limit: usize) -> Result<()> {
    let cases = store.list_cases(limit)?;
    if cases.is_empty() {
        println!("No cases yet. Create one with `ct new`.");
        return Ok(());
    }
    for case in cases {
        let created = chrono::DateTime::from_timestamp(case.created_at as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  {}", case.id, created);
    }
    Ok(())
}

fn update_meta(
    store: &CaseStore,
    case_id: &str,
    user_name: Option<String>,
    domain: Option<String>,
    goal: Option<String>,
) -> Result<()> {
    let mut meta = store.case_meta(case_id)?.unwrap_or_default();

    if user_name.is_none() && domain.is_none() && goal.is_none() {
        if meta.is_empty() {
            println!("(no case metadata provided)");
        } else {
            print!("{}", toml::to_string(&meta)?);
        }
        return Ok(());
    }

    store.get_or_create_case(case_id)?;
    merge_meta(&mut meta, user_name, domain, goal);
    store.set_case_meta(case_id, &meta)?;
    println!("Saved case details for {}.", case_id);
    Ok(())
}

/// Overwrite only the fields that were given.
fn merge_meta(
    meta: &mut CaseMeta,
    user_name: Option<String>,
    domain: Option<String>,
    goal: Option<String>,
) {
    if user_name.is_some() {
        meta.user_name = user_name;
    }
    if domain.is_some() {
        meta.domain = domain;
    }
    if goal.is_some() {
        meta.goal = goal;
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("# {}", Config::config_path()?.display());
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
