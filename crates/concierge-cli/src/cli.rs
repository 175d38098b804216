//! CLI argument definitions for the concierge assistant.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Concierge -- a personal assistant for tasks, meetings and messages.
#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Concierge -- personal assistant for tasks, meetings and messages",
    long_about = "Classifies each message, routes it to a specialized agent (task, meeting, \
                  message, knowledge, search or conversation) and reports what was done."
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive REPL.
    Run(SessionArgs),

    /// Route a single message and print the response.
    Ask {
        /// The message to route.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the full response, metadata and decision trace as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Create the data directory and initialize the database.
    Setup,

    /// Show configuration and storage status.
    Status,
}

/// Options shared by the commands that route messages.
#[derive(Args, Clone, Default)]
pub struct SessionArgs {
    /// Identity of the sender; messages addressed to "me" go here.
    #[arg(long, short)]
    pub sender: Option<String>,

    /// Use an in-memory database that is discarded on exit.
    #[arg(long)]
    pub ephemeral: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_joins_words() {
        let cli = Cli::parse_from(["concierge", "ask", "remind", "me", "--json", "-s", "42"]);
        match cli.command {
            Commands::Ask {
                text,
                json,
                session,
            } => {
                assert_eq!(text.join(" "), "remind me");
                assert!(json);
                assert_eq!(session.sender.as_deref(), Some("42"));
            }
            _ => panic!("expected ask"),
        }
    }
}
