//! snip shell
//!
//! Create, edit and read pastes and short links against a local store.
//!
//! # Usage
//!
//! ```bash
//! # Interactive, in-memory store
//! snip
//!
//! # Persistent store
//! snip --db ~/.local/share/snip/snip.db
//!
//! # One command, JSON output
//! snip --json -C "put mylink https://example.com"
//!
//! # Act through an API key from the config file
//! snip --config /etc/snip/snip.toml --api-key k-4f1c
//! ```

mod config;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use snip_core::{
    DocumentReader, DocumentResolver, DocumentStore, Notifier, PermissionResolver,
};
use snip_stats::Metrics;
use snip_storage::{MemoryStorage, SqliteStorage};

use crate::config::Config;
use crate::shell::{print_reply, Command, Reply, Shell};

/// snip - pastes and short links
#[derive(Parser, Debug)]
#[command(name = "snip")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SNIP_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file; default: in-memory)
    #[arg(long, env = "SNIP_DB")]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SNIP_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Session user id
    #[arg(short, long, env = "SNIP_USER")]
    user: Option<String>,

    /// API key to act through
    #[arg(short = 'k', long, env = "SNIP_API_KEY")]
    api_key: Option<String>,

    /// Mark requests as coming from the frontend (API keys are ignored)
    #[arg(long)]
    frontend: bool,

    /// Print create/edit results as JSON
    #[arg(long)]
    json: bool,

    /// Execute command and exit
    #[arg(short = 'C', long = "command")]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let store = open_store(args.db.as_ref().or(config.store.db.as_ref()))?;

    // Statistics run in the background for the whole session
    let metrics = Arc::new(Metrics::new().context("Failed to create metrics")?);
    let (notifier, reporter) = snip_stats::channel(metrics.clone());
    let reporter = tokio::spawn(reporter.run());
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);

    let resolver = DocumentResolver::new(store.clone(), config.generator(), notifier.clone())
        .with_config(config.resolver_config());
    let reader = DocumentReader::new(store, notifier.clone());
    let api_keys = config.api_keys();
    info!(keys = api_keys.len(), "Loaded API keys");
    let permissions = PermissionResolver::new(Arc::new(api_keys), notifier);

    let user_id = args
        .user
        .clone()
        .unwrap_or_else(|| format!("anon-{}", std::process::id()));
    let users = Box::new(move |id: &str| config.user(id));

    let shell = Shell::new(resolver, reader, permissions, metrics, users, &user_id)
        .with_api_key(args.api_key.clone())
        .with_frontend(args.frontend);

    let json = args.json;
    let outcome = match args.command.clone() {
        Some(line) => tokio::task::spawn_blocking(move || run_once(shell, &line, json)).await?,
        None => {
            if !args.quiet {
                print_banner();
            }
            tokio::task::spawn_blocking(move || run_interactive(shell, json)).await?
        }
    };

    // Every notifier went away with the shell; let the reporter drain
    reporter.await?;
    outcome
}

fn open_store(db: Option<&PathBuf>) -> Result<Arc<dyn DocumentStore>> {
    match db {
        Some(path) => {
            info!(path = %path.display(), "Opening SQLite store");
            let storage = SqliteStorage::new(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Ok(Arc::new(storage))
        }
        None => {
            info!("Running in-memory only (no --db specified)");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

fn run_once(mut shell: Shell, line: &str, json: bool) -> Result<()> {
    let command = Command::parse(line).map_err(anyhow::Error::msg)?;
    let reply = shell.execute(command);
    print_reply(&reply, json);

    if let Reply::Error(e) = reply {
        anyhow::bail!(e);
    }
    Ok(())
}

fn run_interactive(mut shell: Shell, json: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = shell.prompt().green().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let command = match Command::parse(line) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        continue;
                    }
                };

                let reply = shell.execute(command);
                print_reply(&reply, json);
                if reply == Reply::Quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            debug!(path = %path.display(), error = %e, "Could not save history");
        }
    }

    Ok(())
}

/// `~/.snip_history`, when a home directory is known
fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".snip_history"))
}

fn print_banner() {
    println!(
        "{}",
        format!(
            r#"
  ┌─┐┌┐┌┬┌─┐
  └─┐││││├─┘   pastes & short links
  └─┘┘└┘┴┴     Version {}
               Type 'help' for commands, 'quit' to exit
"#,
            env!("CARGO_PKG_VERSION")
        )
        .cyan()
    );
}
