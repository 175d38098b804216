//! CLI entry point for the concierge assistant.
//!
//! This binary provides the `concierge` command with subcommands for
//! chatting with the assistant, one-shot requests, setup and status.

mod app;
mod bridge;
mod cli;
mod config;
mod context;
mod delivery;
mod repl;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use concierge_agent::{Collection, KnowledgeProvider};
use concierge_store::{Database, DocumentIndex, RecordStore};

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, ProviderKind};
use crate::context::FileKnowledge;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("  Warning: failed to load .env: {e}");
    }

    let default_level = match cli.command {
        Commands::Status | Commands::Ask { .. } => "warn",
        Commands::Run(_) | Commands::Setup => "info",
    };
    init_tracing(default_level, cli.json_logs);

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run(session) => repl::cmd_run(&config, session).await,
        Commands::Ask {
            text,
            json,
            session,
        } => repl::cmd_ask(&config, &text.join(" "), json, session).await,
        Commands::Setup => cmd_setup(&config, &cli.config).await,
        Commands::Status => cmd_status(&config, &cli.config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: setup
// ---------------------------------------------------------------------------

async fn cmd_setup(config: &AppConfig, config_path: &Path) -> Result<()> {
    println!();
    println!("  Concierge Setup");
    println!("  ===============");
    println!();

    // Step 1: data and transcript directories.
    for dir in [&config.store.data_dir, &config.context.transcripts_dir] {
        if dir.exists() {
            println!("  [=] {} already exists", dir.display());
        } else {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            println!("  [+] Created {}", dir.display());
        }
    }

    // Step 2: database.
    let db_path = config.store.database_path();
    let display_path = db_path.display().to_string();
    Database::open_and_migrate(db_path)
        .await
        .context("failed to initialize database")?;
    println!("  [+] Database initialized at {display_path}");

    // Step 3: configuration and credentials.
    if config_path.exists() {
        println!("  [=] Config found at {}", config_path.display());
    } else {
        println!("  [!] No config at {}; defaults are used", config_path.display());
    }
    print_credentials(config);

    println!();
    println!("  Setup complete! Run `concierge run` to start.");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config: &AppConfig, config_path: &Path) -> Result<()> {
    println!();
    println!("  Concierge Status");
    println!("  ================");
    println!();

    if config_path.exists() {
        println!("  Config:           OK ({})", config_path.display());
    } else {
        println!("  Config:           DEFAULTS (no {})", config_path.display());
    }
    println!(
        "  Model:            {:?} / {}",
        config.llm.provider, config.llm.model
    );
    print_credentials(config);

    let db_path = config.store.database_path();
    if db_path.exists() {
        let db = Database::open_and_migrate(db_path.clone())
            .await
            .context("failed to open database")?;
        let tasks = RecordStore::new(db.clone())
            .list_tasks(1000)
            .await
            .context("failed to list tasks")?;
        println!("  Database:         OK ({})", db_path.display());
        println!("  Tasks:            {}", tasks.len());
        let index = DocumentIndex::new(db);
        for collection in Collection::ALL {
            let name = collection.as_str();
            let count = index.count(name).await?;
            println!("  Index/{name:<12}{count}");
        }
    } else {
        println!("  Database:         NOT INITIALIZED (run `concierge setup`)");
    }

    let knowledge = FileKnowledge::new(&config.context.directory, &config.context.transcripts_dir);
    match knowledge.ensure_synced().await {
        Ok(()) => {
            let dir = knowledge.directory().await;
            println!(
                "  Context:          {} people, {} projects, {} glossary terms",
                dir.people.len(),
                dir.projects.len(),
                dir.glossary.len()
            );
        }
        Err(e) => println!("  Context:          INVALID ({e})"),
    }
    match knowledge.latest_meeting().await {
        Ok(Some(meeting)) => println!("  Latest meeting:   {}", meeting.title),
        Ok(None) => println!("  Latest meeting:   NONE ({})", config.context.transcripts_dir.display()),
        Err(e) => println!("  Latest meeting:   UNREADABLE ({e})"),
    }

    println!();
    Ok(())
}

fn print_credentials(config: &AppConfig) {
    if config.llm.provider == ProviderKind::Ollama {
        println!("  API key:          not needed for Ollama");
        return;
    }
    let var = &config.llm.api_key_env;
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => println!("  API key:          ${var} is set"),
        _ => println!("  API key:          ${var} is NOT SET"),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber. `RUST_LOG` overrides `default_level`.
fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
