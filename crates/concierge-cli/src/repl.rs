//! Subcommands that route messages: `concierge run` and `concierge ask`.

use std::io::{self, Write as _};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::app::{App, render};
use crate::cli::SessionArgs;
use crate::config::AppConfig;

/// Route one message and print the result.
pub async fn cmd_ask(config: &AppConfig, text: &str, json: bool, session: SessionArgs) -> Result<()> {
    let app = App::start(config, session.ephemeral).await?;
    let sender = session.sender.or_else(|| config.agents.default_sender.clone());

    let response = app.handle(text, sender.as_deref()).await;
    if json {
        let out = serde_json::to_string_pretty(&response).context("failed to encode response")?;
        println!("{out}");
    } else {
        println!("{}", render(&response));
    }

    let pending = app.pending_messages().await;
    if pending > 0 {
        warn!(pending, "scheduled messages are dropped when the process exits; use `concierge run`");
    }
    app.shutdown().await;
    Ok(())
}

/// Interactive loop. Scheduled messages are delivered while it runs.
pub async fn cmd_run(config: &AppConfig, session: SessionArgs) -> Result<()> {
    let app = App::start(config, session.ephemeral).await?;
    let sender = session.sender.or_else(|| config.agents.default_sender.clone());

    println!();
    println!("  Concierge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Model: {}", app.model());
    if let Some(ref sender) = sender {
        println!("  Sender: {sender}");
    }
    if session.ephemeral {
        println!("  Storage: in-memory (discarded on exit)");
    }
    println!("  Type a message, or 'quit' to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("interrupted");
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                println!();
                info!("EOF received, exiting");
                break;
            }
            Err(e) => {
                eprintln!("  Error reading input: {e}");
                continue;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            info!("user requested exit");
            break;
        }

        let response = app.handle(trimmed, sender.as_deref()).await;
        println!();
        println!("{}", render(&response));
        println!();
    }

    let pending = app.pending_messages().await;
    if pending > 0 {
        println!("  {pending} scheduled message(s) were not delivered.");
    }
    app.shutdown().await;
    Ok(())
}
