//! Interactive chat mode with readline support.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config, Editor};

use ct_core::{Guideline, Turn, TurnRole};

use crate::config::Config as AppConfig;
use crate::turn::{CaseAssistant, TurnOutcome};

/// Chat commands
#[derive(Debug, PartialEq)]
enum ChatCommand {
    Quit,
    History,
    Summary,
    Meta,
    Guidelines,
    Help,
    None(String), // Regular message
}

fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatCommand::None(String::new());
    }

    if !trimmed.starts_with('/') {
        return ChatCommand::None(trimmed.to_string());
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/history" | "/h" => ChatCommand::History,
        "/summary" | "/s" => ChatCommand::Summary,
        "/meta" | "/m" => ChatCommand::Meta,
        "/guidelines" | "/g" => ChatCommand::Guidelines,
        "/help" | "/?" => ChatCommand::Help,
        _ => {
            eprintln!("Unknown command: {}. Type /help for available commands.", cmd);
            ChatCommand::None(String::new())
        }
    }
}

fn print_help() {
    println!(
        r#"
Chat Commands:
  /help, /?         Show this help message
  /quit, /exit      Exit chat mode
  /history, /h      Show the case conversation
  /summary, /s      Show the context summary the next prompt will use
  /meta, /m         Show case metadata (set it with `ct meta`)
  /guidelines, /g   Toggle printing guideline results after each reply

Tips:
  - Press Ctrl+D to exit
  - Up/Down arrows navigate history
"#
    );
}

pub fn print_history(history: &[Turn]) {
    if history.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for turn in history {
        let label = match turn.role {
            TurnRole::User => "you",
            TurnRole::Assistant => "assistant",
        };
        println!("[{}] {}\n", label, turn.content);
    }
}

pub fn print_guidelines(guidelines: &[Guideline]) {
    if guidelines.is_empty() {
        println!("No guidelines found for this query.");
        return;
    }
    for g in guidelines {
        println!("• {}", g.title);
        if !g.summary.is_empty() {
            println!("  {}", g.summary);
        }
        println!("  Source: {}  Published: {}", g.source, g.published_at);
        if !g.url.is_empty() {
            println!("  {}", g.url);
        }
    }
    println!();
}

fn print_outcome(outcome: &TurnOutcome, show_guidelines: bool) {
    if let Some(err) = &outcome.guideline_error {
        eprintln!("Warning: guidelines lookup failed: {}", err);
    }
    if show_guidelines {
        println!("\n── Guidelines ──");
        print_guidelines(&outcome.guidelines);
    }
    println!("\n{}\n", outcome.reply);
}

fn history_file() -> Option<PathBuf> {
    AppConfig::config_dir().ok().map(|d| d.join("chat_history.txt"))
}

/// Run interactive chat mode for one case.
pub async fn run_chat(assistant: &CaseAssistant, case_id: &str, show_guidelines: bool) -> Result<()> {
    assistant.store().get_or_create_case(case_id)?;

    if !atty::is(atty::Stream::Stdin) {
        return run_piped(assistant, case_id, show_guidelines).await;
    }

    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(config)?;

    let history_path = history_file();
    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    let turns = assistant
        .store()
        .history(case_id, assistant.settings().history_limit)?;
    println!("Case: {} ({} messages). Type /help for commands.\n", case_id, turns.len());

    let mut show_guidelines = show_guidelines;

    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_command(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Help => print_help(),
            ChatCommand::History => {
                let turns = assistant
                    .store()
                    .history(case_id, assistant.settings().history_limit)?;
                print_history(&turns);
            }
            ChatCommand::Summary => {
                let summary = assistant.summary(case_id, assistant.settings().max_chars)?;
                if summary.is_empty() {
                    println!("(no context yet)");
                } else {
                    println!("{}\n", summary);
                }
            }
            ChatCommand::Meta => match assistant.store().case_meta(case_id)? {
                Some(meta) if !meta.is_empty() => {
                    println!("User name: {}", meta.user_name().unwrap_or("-"));
                    println!("Domain:    {}", meta.domain().unwrap_or("-"));
                    println!("Goal:      {}", meta.goal().unwrap_or("-"));
                }
                _ => println!("(no case metadata provided)"),
            },
            ChatCommand::Guidelines => {
                show_guidelines = !show_guidelines;
                println!(
                    "Guideline results {}",
                    if show_guidelines { "shown" } else { "hidden" }
                );
            }
            ChatCommand::None(message) => {
                if message.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(message.as_str());

                let outcome = assistant.respond(case_id, &message).await?;
                print_outcome(&outcome, show_guidelines);
            }
        }
    }

    if let Some(path) = &history_path {
        if let Err(e) = rl.save_history(path) {
            tracing::debug!(error = %e, "Could not save chat history");
        }
    }

    Ok(())
}

/// Non-interactive input: every non-empty stdin line is one user turn.
async fn run_piped(assistant: &CaseAssistant, case_id: &str, show_guidelines: bool) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if let ChatCommand::None(message) = parse_command(&line) {
            if message.is_empty() {
                continue;
            }
            let outcome = assistant.respond(case_id, &message).await?;
            print_outcome(&outcome, show_guidelines);
        }
    }
    Ok(())
}
